//! HTTP surface for the Document Analyzer.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `GET /` – Minimal HTML upload form (model name, temperature, page range, mode, query) that
//!   renders the returned text and processing time in place.
//! - `POST /analyze` – Multipart upload of a PDF plus options. Summarizes the document or answers
//!   the query and returns the text with processing annotations (`elapsed_ms`, `pages`, `chunks`,
//!   `model_calls`, `document_id`, `completed_at`).
//! - `GET /metrics` – Observe analysis counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! The HTTP surface shares the same analysis pipeline with the MCP server and the CLI, so
//! behavior is identical across interfaces.

use crate::config::{ChainOverrides, ModelProvider};
use crate::document::PageRange;
use crate::metrics::MetricsSnapshot;
use crate::processing::{
    AnalysisApi, AnalysisError, AnalysisMode, AnalysisRequest, QueryError, SummarizeError, Upload,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

const UPLOAD_FORM: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Document Analyzer</title></head>
<body>
<h1>Document Analyzer</h1>
<form id="analyze-form" action="/analyze" method="post" enctype="multipart/form-data">
  <p><label>PDF file <input type="file" name="file" accept="application/pdf" required></label></p>
  <p><label>Model name <input type="text" name="model_name" placeholder="gpt-4"></label></p>
  <p><label>Temperature <input type="number" name="temperature" min="0" max="1" step="0.1" value="0.1"></label></p>
  <p><label>Start page <input type="number" name="start_page"></label>
     <label>End page <input type="number" name="end_page"></label></p>
  <p><label>Mode
    <select name="mode">
      <option value="summarize">Summarize</option>
      <option value="query">Query</option>
    </select></label></p>
  <p><label>Query <textarea name="query" rows="3" cols="60"></textarea></label></p>
  <p><button type="submit">Analyze</button></p>
</form>
<section id="result" hidden>
  <h2 id="result-title"></h2>
  <pre id="result-text" style="white-space: pre-wrap"></pre>
  <p id="result-time"></p>
</section>
<script>
document.getElementById("analyze-form").addEventListener("submit", async (event) => {
  event.preventDefault();
  const section = document.getElementById("result");
  const title = document.getElementById("result-title");
  const text = document.getElementById("result-text");
  const time = document.getElementById("result-time");
  section.hidden = false;
  title.textContent = "Working...";
  text.textContent = "";
  time.textContent = "";
  const response = await fetch("/analyze", { method: "POST", body: new FormData(event.target) });
  const payload = await response.json();
  if (!response.ok) {
    title.textContent = "Error";
    text.textContent = payload.error;
    return;
  }
  title.textContent = payload.mode === "query" ? "Answer" : "Summary";
  text.textContent = payload.result;
  time.textContent = `Time taken: ${(payload.elapsed_ms / 1000).toFixed(2)} seconds`;
});
</script>
</body>
</html>
"#;

/// Build the HTTP router exposing the analysis API surface.
///
/// `upload_limit` caps the request body accepted by `POST /analyze`.
pub fn create_router<S>(service: Arc<S>, upload_limit: usize) -> Router
where
    S: AnalysisApi + 'static,
{
    Router::new()
        .route("/", get(upload_form))
        .route(
            "/analyze",
            post(analyze_document::<S>).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

async fn upload_form() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}

/// Success response for the `POST /analyze` endpoint.
#[derive(Serialize)]
struct AnalyzeResponse {
    /// Summary or answer text.
    result: String,
    /// `summarize` or `query`.
    mode: &'static str,
    /// Processing time in milliseconds.
    elapsed_ms: u64,
    /// Pages analyzed.
    pages: usize,
    /// Chunks sent through the pipeline.
    chunks: usize,
    /// Chat-model calls issued.
    model_calls: usize,
    /// SHA-256 of the uploaded bytes.
    document_id: String,
    /// RFC 3339 completion timestamp.
    completed_at: String,
}

/// Analyze an uploaded document.
///
/// Reads the multipart form, then hands the request to the analysis service. Unknown fields are
/// ignored; blank optional fields fall back to the configured defaults.
async fn analyze_document<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError>
where
    S: AnalysisApi,
{
    let request = read_analyze_form(multipart).await?;
    tracing::info!(
        file = %request.upload.file_name,
        bytes = request.upload.bytes.len(),
        mode = request.mode.label(),
        "Analyze request received"
    );
    let outcome = service.analyze(request).await?;
    Ok(Json(AnalyzeResponse {
        result: outcome.text,
        mode: outcome.mode.label(),
        elapsed_ms: outcome.elapsed.as_millis() as u64,
        pages: outcome.pages,
        chunks: outcome.chunks,
        model_calls: outcome.model_calls,
        document_id: outcome.document_id,
        completed_at: outcome.completed_at,
    }))
}

async fn read_analyze_form(mut multipart: Multipart) -> Result<AnalysisRequest, AppError> {
    let mut upload = Upload::default();
    let mut mode = None;
    let mut query = String::new();
    let mut page_range = PageRange::all();
    let mut overrides = ChainOverrides::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            upload.file_name = field.file_name().unwrap_or("upload.pdf").to_string();
            upload.bytes = field.bytes().await?.to_vec();
            continue;
        }

        let value = field.text().await?;
        let value = value.trim();
        match name.as_str() {
            "mode" => mode = non_blank(value).map(str::to_lowercase),
            "query" => query = value.to_string(),
            "start_page" => page_range.start = parse_field(&name, value)?,
            "end_page" => page_range.end = parse_field(&name, value)?,
            "model_name" => overrides.model = non_blank(value).map(str::to_string),
            "temperature" => overrides.temperature = parse_field(&name, value)?,
            "base_url" => overrides.base_url = non_blank(value).map(str::to_string),
            "api_key" => overrides.api_key = non_blank(value).map(str::to_string),
            "provider" => {
                overrides.provider = non_blank(value)
                    .map(|provider| {
                        provider.parse::<ModelProvider>().map_err(|()| {
                            AppError::BadRequest(format!("Unknown provider '{provider}'"))
                        })
                    })
                    .transpose()?
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    let mode = match mode.as_deref() {
        None | Some("summarize") => AnalysisMode::Summarize,
        Some("query") => AnalysisMode::Query { query },
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "Unknown mode '{other}'; expected 'summarize' or 'query'"
            )));
        }
    };

    Ok(AnalysisRequest {
        upload,
        mode,
        page_range,
        overrides,
    })
}

fn non_blank(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> Result<Option<T>, AppError> {
    non_blank(value)
        .map(|raw| {
            raw.parse()
                .map_err(|_| AppError::BadRequest(format!("Invalid value for '{name}': {raw}")))
        })
        .transpose()
}

/// Return the analysis counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: AnalysisApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "analyze",
                method: "POST",
                path: "/analyze",
                description: "Upload a PDF as multipart/form-data and summarize it or answer a query about it. Response returns { \"result\": string, \"elapsed_ms\": number, ... }.",
                request_example: Some(json!({
                    "file": "<binary PDF>",
                    "mode": "query",
                    "query": "What data sources are used?",
                    "start_page": 0,
                    "end_page": -1,
                    "model_name": "gpt-4",
                    "temperature": 0.1,
                    "provider": "openai",
                    "base_url": "http://localhost:11434/v1",
                    "api_key": "optional"
                })),
            },
            CommandDescriptor {
                name: "upload_form",
                method: "GET",
                path: "/",
                description: "Minimal HTML form that posts to /analyze.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return analysis counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    BadRequest(String),
    Multipart(MultipartError),
    Analysis(AnalysisError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Multipart(error) => error.status(),
            Self::Analysis(error) => analysis_status(error),
        }
    }
}

fn analysis_status(error: &AnalysisError) -> StatusCode {
    match error {
        AnalysisError::MissingFile | AnalysisError::EmptyQuery | AnalysisError::Configuration(_) => {
            StatusCode::BAD_REQUEST
        }
        AnalysisError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AnalysisError::Query(QueryError::Map { .. } | QueryError::Reduce { .. })
        | AnalysisError::Summarize(SummarizeError::Model(_)) => StatusCode::BAD_GATEWAY,
        AnalysisError::Query(
            QueryError::EmptyDocument
            | QueryError::ContextOverflow { .. }
            | QueryError::CollapseLimit { .. },
        )
        | AnalysisError::Summarize(
            SummarizeError::EmptyDocument | SummarizeError::DocumentTooLong { .. },
        ) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::BadRequest(message) => message,
            Self::Multipart(error) => error.body_text(),
            Self::Analysis(error) => error.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Analyze request failed");
        } else {
            tracing::info!(status = status.as_u16(), error = %message, "Analyze request rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<AnalysisError> for AppError {
    fn from(inner: AnalysisError) -> Self {
        Self::Analysis(inner)
    }
}

impl From<MultipartError> for AppError {
    fn from(inner: MultipartError) -> Self {
        Self::Multipart(inner)
    }
}
