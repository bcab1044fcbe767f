//! Adapter for the native Ollama `/api/generate` endpoint.

use crate::config::ChainConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{ChatModel, ChatModelError, endpoint, failure_from_response};

/// Chat model backed by a local Ollama runtime.
pub struct OllamaChatModel {
    http: Client,
}

impl OllamaChatModel {
    /// Wrap an existing HTTP client.
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl ChatModel for OllamaChatModel {
    async fn complete(&self, prompt: &str, config: &ChainConfig) -> Result<String, ChatModelError> {
        let url = endpoint(&config.base_url, "api/generate");
        let payload = json!({
            "model": config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": config.temperature,
            }
        });

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                ChatModelError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    config.base_url
                ))
            })?;

        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            ChatModelError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(ChatModelError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}
