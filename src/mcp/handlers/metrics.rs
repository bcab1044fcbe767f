//! Handler for the metrics tool.

use std::sync::Arc;

use crate::{mcp::format::metrics_payload, processing::AnalysisApi};
use rmcp::{ErrorData as McpError, model::CallToolResult};

/// Handle the `metrics` tool, returning the current analysis counters.
pub(crate) async fn handle_metrics(
    analysis: &Arc<dyn AnalysisApi>,
) -> Result<CallToolResult, McpError> {
    let snapshot = analysis.metrics_snapshot();
    Ok(CallToolResult::structured(metrics_payload(&snapshot)))
}
