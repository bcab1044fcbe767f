//! Chat-model capability used by the analysis pipeline.
//!
//! Every model call goes through [`ChatModel::complete`] with an explicit [`ChainConfig`]; the
//! adapters hold nothing but an HTTP client, so one instance can serve concurrent requests with
//! different models or endpoints. [`ProviderRouter`] picks the adapter matching
//! `ChainConfig::provider` at call time.

mod ollama;
mod openai;

use crate::config::{ChainConfig, ModelProvider};
use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

pub use ollama::OllamaChatModel;
pub use openai::OpenAiChatModel;

/// Errors surfaced by chat-model adapters.
#[derive(Debug, Error)]
pub enum ChatModelError {
    /// Endpoint could not be reached.
    #[error("Model provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Endpoint answered with a non-success status.
    #[error("Model request failed with status {status}: {body}")]
    RequestFailed {
        /// HTTP status code returned by the endpoint.
        status: u16,
        /// Response body, as far as it could be read.
        body: String,
    },
    /// Response body did not have the expected shape.
    #[error("Malformed model response: {0}")]
    InvalidResponse(String),
}

/// Capability implemented by every model backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a single-turn prompt and return the model's text.
    ///
    /// The OpenAI and Ollama adapters trim surrounding whitespace from the reply; the text is
    /// otherwise untouched.
    async fn complete(&self, prompt: &str, config: &ChainConfig) -> Result<String, ChatModelError>;
}

/// Dispatches each call to the adapter selected by the chain configuration.
pub struct ProviderRouter {
    openai: OpenAiChatModel,
    ollama: OllamaChatModel,
}

impl ProviderRouter {
    /// Build both adapters on top of a shared HTTP client.
    pub fn new() -> Result<Self, ChatModelError> {
        let http = build_http_client()?;
        Ok(Self {
            openai: OpenAiChatModel::new(http.clone()),
            ollama: OllamaChatModel::new(http),
        })
    }
}

#[async_trait]
impl ChatModel for ProviderRouter {
    async fn complete(&self, prompt: &str, config: &ChainConfig) -> Result<String, ChatModelError> {
        match config.provider {
            ModelProvider::OpenAI => self.openai.complete(prompt, config).await,
            ModelProvider::Ollama => self.ollama.complete(prompt, config).await,
        }
    }
}

/// Build the shared `reqwest` client used by the adapters.
pub(crate) fn build_http_client() -> Result<Client, ChatModelError> {
    Client::builder()
        .user_agent(concat!("docanalyzer/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| {
            ChatModelError::ProviderUnavailable(format!("failed to build HTTP client: {error}"))
        })
}

/// Join a base URL and an endpoint path without doubling slashes.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Convert a non-success response into [`ChatModelError::RequestFailed`].
pub(crate) async fn failure_from_response(response: reqwest::Response) -> ChatModelError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ChatModelError::RequestFailed { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_duplicate_slashes() {
        assert_eq!(
            endpoint("http://localhost:11434/v1/", "/chat/completions"),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(
            endpoint("http://localhost:11434", "api/generate"),
            "http://localhost:11434/api/generate"
        );
    }
}
