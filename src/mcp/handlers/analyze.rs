//! MCP handlers for the document analysis tools.

use std::path::Path;
use std::sync::Arc;

use crate::{
    config::{ChainOverrides, ModelProvider},
    document::PageRange,
    mcp::format::outcome_payload,
    processing::{AnalysisApi, AnalysisError, AnalysisMode, AnalysisRequest, Upload},
};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;

use super::parse_arguments;

/// Request payload accepted by `summarize-document` and `query-document`.
#[derive(Debug, Deserialize)]
pub(crate) struct DocumentToolRequest {
    /// Local path of the PDF to analyze.
    pub(crate) path: String,
    /// Question to answer; required by `query-document`.
    #[serde(default)]
    pub(crate) query: Option<String>,
    /// First selected page (0-based, inclusive).
    #[serde(default)]
    pub(crate) start_page: Option<i64>,
    /// Page after the last selected one (0-based, exclusive).
    #[serde(default)]
    pub(crate) end_page: Option<i64>,
    /// Optional model override.
    #[serde(default)]
    pub(crate) model_name: Option<String>,
    /// Optional temperature override.
    #[serde(default)]
    pub(crate) temperature: Option<f32>,
    /// Optional endpoint protocol override.
    #[serde(default)]
    pub(crate) provider: Option<String>,
    /// Optional endpoint override.
    #[serde(default)]
    pub(crate) base_url: Option<String>,
    /// Optional credential override.
    #[serde(default)]
    pub(crate) api_key: Option<String>,
}

/// Handle the `summarize-document` tool.
pub(crate) async fn handle_summarize_document(
    analysis: &Arc<dyn AnalysisApi>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: DocumentToolRequest = parse_arguments(arguments)?;
    run_document_tool(analysis, args, |_| Ok(AnalysisMode::Summarize)).await
}

/// Handle the `query-document` tool.
pub(crate) async fn handle_query_document(
    analysis: &Arc<dyn AnalysisApi>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: DocumentToolRequest = parse_arguments(arguments)?;
    run_document_tool(analysis, args, |query| match query {
        Some(query) if !query.trim().is_empty() => Ok(AnalysisMode::Query { query }),
        _ => Err(McpError::invalid_params("`query` must not be empty", None)),
    })
    .await
}

async fn run_document_tool(
    analysis: &Arc<dyn AnalysisApi>,
    args: DocumentToolRequest,
    select_mode: impl FnOnce(Option<String>) -> Result<AnalysisMode, McpError>,
) -> Result<CallToolResult, McpError> {
    let DocumentToolRequest {
        path,
        query,
        start_page,
        end_page,
        model_name,
        temperature,
        provider,
        base_url,
        api_key,
    } = args;

    if path.trim().is_empty() {
        return Err(McpError::invalid_params("`path` must not be empty", None));
    }
    let mode = select_mode(query)?;
    let provider = provider
        .filter(|value| !value.trim().is_empty())
        .map(|value| {
            value.parse::<ModelProvider>().map_err(|()| {
                McpError::invalid_params(format!("Unknown provider '{value}'"), None)
            })
        })
        .transpose()?;

    let bytes = tokio::fs::read(&path).await.map_err(|err| {
        McpError::invalid_params(format!("Cannot read document '{path}': {err}"), None)
    })?;
    let file_name = Path::new(&path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document.pdf")
        .to_string();

    let request = AnalysisRequest {
        upload: Upload { file_name, bytes },
        mode,
        page_range: PageRange::new(start_page, end_page),
        overrides: ChainOverrides {
            provider,
            model: model_name,
            temperature,
            base_url,
            api_key,
        },
    };

    let outcome = analysis.analyze(request).await.map_err(to_mcp_error)?;
    Ok(CallToolResult::structured(outcome_payload(&outcome)))
}

/// Caller mistakes become `invalid_params`; everything else is an internal error.
fn to_mcp_error(error: AnalysisError) -> McpError {
    match error {
        AnalysisError::MissingFile
        | AnalysisError::EmptyQuery
        | AnalysisError::Configuration(_)
        | AnalysisError::Extraction(_) => McpError::invalid_params(error.to_string(), None),
        other => McpError::internal_error(other.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::llm::ChatModelError;
    use crate::processing::SummarizeError;
    use rmcp::model::ErrorCode;

    #[test]
    fn configuration_errors_are_invalid_params() {
        let error = to_mcp_error(AnalysisError::Configuration(ConfigError::MissingModel));
        assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
    }

    #[test]
    fn model_failures_are_internal_errors() {
        let error = to_mcp_error(AnalysisError::Summarize(SummarizeError::Model(
            ChatModelError::ProviderUnavailable("down".into()),
        )));
        assert_eq!(error.code, ErrorCode::INTERNAL_ERROR);
        assert!(error.message.contains("down"));
    }
}
