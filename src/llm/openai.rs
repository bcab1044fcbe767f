//! Adapter for OpenAI-compatible `/chat/completions` endpoints.

use crate::config::ChainConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{ChatModel, ChatModelError, endpoint, failure_from_response};

/// Chat model speaking the OpenAI chat-completions protocol.
pub struct OpenAiChatModel {
    http: Client,
}

impl OpenAiChatModel {
    /// Wrap an existing HTTP client.
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, prompt: &str, config: &ChainConfig) -> Result<String, ChatModelError> {
        let url = endpoint(&config.base_url, "chat/completions");
        let payload = json!({
            "model": config.model,
            "temperature": config.temperature,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let mut request = self.http.post(&url).json(&payload);
        if let Some(key) = config.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|error| {
            ChatModelError::ProviderUnavailable(format!("failed to reach {url}: {error}"))
        })?;

        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        let body: CompletionResponse = response.json().await.map_err(|error| {
            ChatModelError::InvalidResponse(format!("failed to decode completion: {error}"))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ChatModelError::InvalidResponse("completion had no content".into()))
    }
}
