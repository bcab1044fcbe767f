//! Formatting helpers shared across MCP handlers and resources.

use crate::{config::ChainConfig, metrics::MetricsSnapshot, processing::AnalysisOutcome};
use rmcp::model::ResourceContents;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{Value, json};

pub(crate) const APPLICATION_JSON: &str = "application/json";

/// Serialize a value to JSON, falling back to compact formatting on error.
pub(crate) fn serialize_json<T: Serialize>(value: &T, context_uri: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|error| {
        tracing::warn!(uri = context_uri, %error, "Failed to serialize JSON prettily");
        serde_json::to_string(value).unwrap_or_else(|_| "{}".into())
    })
}

/// Build JSON resource contents for MCP resource responses.
pub(crate) fn json_resource_contents(uri: &str, text: String) -> ResourceContents {
    ResourceContents::TextResourceContents {
        uri: uri.to_string(),
        mime_type: Some(APPLICATION_JSON.into()),
        text,
        meta: None,
    }
}

/// Effective model defaults returned by the `settings` resource.
#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct SettingsSnapshot {
    /// Endpoint protocol.
    pub(crate) provider: String,
    /// Default model identifier.
    pub(crate) model: String,
    /// Default sampling temperature.
    pub(crate) temperature: f32,
    /// Default endpoint base URL.
    pub(crate) base_url: String,
    /// Whether a credential is configured; the credential itself is never exposed.
    pub(crate) credential_configured: bool,
}

impl SettingsSnapshot {
    pub(crate) fn from_chain(chain: &ChainConfig) -> Self {
        Self {
            provider: chain.provider.label().to_string(),
            model: chain.model.clone(),
            temperature: chain.temperature,
            base_url: chain.base_url.clone(),
            credential_configured: chain.api_key.is_some(),
        }
    }
}

/// Structured payload returned by the document tools.
pub(crate) fn outcome_payload(outcome: &AnalysisOutcome) -> Value {
    json!({
        "result": outcome.text,
        "mode": outcome.mode.label(),
        "elapsedMs": outcome.elapsed.as_millis() as u64,
        "pages": outcome.pages,
        "chunks": outcome.chunks,
        "modelCalls": outcome.model_calls,
        "documentId": outcome.document_id,
        "completedAt": outcome.completed_at,
    })
}

/// Structured payload returned by the `metrics` tool.
pub(crate) fn metrics_payload(snapshot: &MetricsSnapshot) -> Value {
    json!({
        "summariesCompleted": snapshot.summaries_completed,
        "queriesCompleted": snapshot.queries_completed,
        "analysesFailed": snapshot.analyses_failed,
        "pagesProcessed": snapshot.pages_processed,
        "chunksProcessed": snapshot.chunks_processed,
        "modelCalls": snapshot.model_calls,
    })
}
