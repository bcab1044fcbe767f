//! Analysis service coordinating staging, extraction, and the model pipelines.

use crate::{
    config::{ChainConfig, Config},
    document::{Document, ExtractionError, PageRange, load_pdf},
    llm::{ChatModel, ChatModelError, ProviderRouter},
    metrics::{AnalysisMetrics, MetricsSnapshot},
    processing::{
        chunking::{build_token_counter, chunk_pages, determine_chunk_size, model_context_window},
        map_reduce::MapReduceEngine,
        summarize::summarize,
        types::{AnalysisError, AnalysisMode, AnalysisOutcome, AnalysisRequest, Upload},
    },
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::Instrument;
use uuid::Uuid;

/// Pipeline knobs taken from the process configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Token budget for every reduce-stage prompt.
    pub token_max: usize,
    /// Explicit map chunk size; derived from the model when unset.
    pub chunk_size: Option<usize>,
    /// Explicit summarize budget; the model context window when unset.
    pub summary_token_max: Option<usize>,
    /// Maximum concurrent map calls.
    pub map_concurrency: usize,
    /// Staging directory for uploads; the system temp dir when unset.
    pub upload_dir: Option<PathBuf>,
}

impl PipelineSettings {
    /// Copy the pipeline knobs out of a loaded [`Config`].
    pub fn from_config(config: &Config) -> Self {
        Self {
            token_max: config.token_max,
            chunk_size: config.chunk_size,
            summary_token_max: config.summary_token_max,
            map_concurrency: config.map_concurrency,
            upload_dir: config.upload_dir.clone(),
        }
    }
}

/// Runs one analysis request end to end: validation, staging, extraction, then summarize or
/// map-reduce query.
///
/// The service holds no per-request state. The chat model receives the resolved
/// [`ChainConfig`] on every call, so one instance is shared by the HTTP, MCP, and CLI surfaces
/// through an `Arc`.
pub struct AnalysisService {
    model: Arc<dyn ChatModel>,
    defaults: ChainConfig,
    settings: PipelineSettings,
    metrics: Arc<AnalysisMetrics>,
}

/// Abstraction over the analysis pipeline used by external surfaces (HTTP, MCP).
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Analyze an uploaded document.
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;

    /// Model defaults applied when a request carries no overrides.
    fn chain_defaults(&self) -> ChainConfig;
}

struct Completed {
    text: String,
    pages: usize,
    chunks: usize,
    document_id: String,
}

impl AnalysisService {
    /// Build a service backed by the provider router and the given configuration.
    pub fn new(config: &Config) -> Result<Self, ChatModelError> {
        let router = ProviderRouter::new()?;
        tracing::info!(
            model = %config.model_name,
            provider = config.model_provider.label(),
            "Chat model router initialized"
        );
        Ok(Self::with_model(
            Arc::new(router),
            config.chain_defaults(),
            PipelineSettings::from_config(config),
        ))
    }

    /// Build a service around an existing chat model.
    pub fn with_model(
        model: Arc<dyn ChatModel>,
        defaults: ChainConfig,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            model,
            defaults,
            settings,
            metrics: Arc::new(AnalysisMetrics::new()),
        }
    }

    /// Analyze a document and annotate the result.
    ///
    /// Input and model configuration are validated before the upload is touched. The upload is
    /// staged to a temporary file that is removed before this returns, whatever the outcome.
    pub async fn run(&self, request: AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "analysis",
            %request_id,
            mode = request.mode.label(),
            file = %request.upload.file_name
        );

        async move {
            let started = Instant::now();
            let mode = request.mode.clone();
            let model = CountingModel::new(self.model.as_ref());
            let result = self.execute(request, &model).await;
            let model_calls = model.calls();

            match result {
                Ok(completed) => {
                    let elapsed = started.elapsed();
                    match &mode {
                        AnalysisMode::Summarize => self
                            .metrics
                            .record_summary(completed.pages as u64, model_calls as u64),
                        AnalysisMode::Query { .. } => self.metrics.record_query(
                            completed.pages as u64,
                            completed.chunks as u64,
                            model_calls as u64,
                        ),
                    }
                    tracing::info!(
                        pages = completed.pages,
                        chunks = completed.chunks,
                        model_calls,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Analysis complete"
                    );
                    Ok(AnalysisOutcome {
                        text: completed.text,
                        mode,
                        elapsed,
                        pages: completed.pages,
                        chunks: completed.chunks,
                        model_calls,
                        document_id: completed.document_id,
                        completed_at: now_rfc3339(),
                    })
                }
                Err(error) => {
                    self.metrics.record_failure(model_calls as u64);
                    tracing::warn!(error = %error, model_calls, "Analysis failed");
                    Err(error)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        request: AnalysisRequest,
        model: &dyn ChatModel,
    ) -> Result<Completed, AnalysisError> {
        let AnalysisRequest {
            upload,
            mode,
            page_range,
            overrides,
        } = request;

        if upload.bytes.is_empty() {
            return Err(AnalysisError::MissingFile);
        }
        if let AnalysisMode::Query { query } = &mode {
            if query.trim().is_empty() {
                return Err(AnalysisError::EmptyQuery);
            }
        }

        let chain = ChainConfig::resolve(&self.defaults, overrides)?;
        tracing::debug!(
            provider = chain.provider.label(),
            model = %chain.model,
            temperature = chain.temperature,
            base_url = %chain.base_url,
            "Resolved chain configuration"
        );

        let document_id = fingerprint(&upload.bytes);
        let document = self.load_document(upload, page_range).await?;
        if document.pages.is_empty() {
            return Err(ExtractionError::NoPagesSelected {
                total_pages: document.total_pages,
            }
            .into());
        }
        if !document.has_text() {
            return Err(ExtractionError::NoText.into());
        }
        let pages = document.pages.len();

        let token_counter = build_token_counter(chain.provider, &chain.model)?;
        let (text, chunks) = match mode {
            AnalysisMode::Summarize => {
                let budget = self
                    .settings
                    .summary_token_max
                    .unwrap_or_else(|| model_context_window(chain.provider, &chain.model));
                let text = summarize(model, &chain, &document, &token_counter, budget).await?;
                (text, 1)
            }
            AnalysisMode::Query { query } => {
                let chunk_size =
                    determine_chunk_size(self.settings.chunk_size, chain.provider, &chain.model);
                let chunks = chunk_pages(&document.pages, chunk_size, &token_counter)?;
                tracing::debug!(chunk_size, chunks = chunks.len(), "Chunked document");
                let engine = MapReduceEngine::new(
                    model,
                    &chain,
                    token_counter,
                    self.settings.token_max,
                )
                .with_concurrency(self.settings.map_concurrency);
                let text = engine.query(&chunks, &query).await?;
                (text, chunks.len())
            }
        };

        Ok(Completed {
            text,
            pages,
            chunks,
            document_id,
        })
    }

    async fn load_document(
        &self,
        upload: Upload,
        page_range: PageRange,
    ) -> Result<Document, AnalysisError> {
        let dir = self
            .settings
            .upload_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        tokio::task::spawn_blocking(move || stage_and_load(&dir, &upload, page_range)).await?
    }

    /// Return the current analysis metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Model defaults applied when a request carries no overrides.
    pub fn chain_defaults(&self) -> ChainConfig {
        self.defaults.clone()
    }
}

#[async_trait]
impl AnalysisApi for AnalysisService {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        AnalysisService::run(self, request).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        AnalysisService::metrics_snapshot(self)
    }

    fn chain_defaults(&self) -> ChainConfig {
        AnalysisService::chain_defaults(self)
    }
}

/// Write the upload to a uniquely named file in `dir`, load it, and remove the file.
fn stage_and_load(
    dir: &Path,
    upload: &Upload,
    page_range: PageRange,
) -> Result<Document, AnalysisError> {
    let mut staged = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&staged_suffix(&upload.file_name))
        .tempfile_in(dir)
        .map_err(AnalysisError::Staging)?;
    staged
        .write_all(&upload.bytes)
        .and_then(|()| staged.flush())
        .map_err(AnalysisError::Staging)?;
    tracing::debug!(
        path = %staged.path().display(),
        bytes = upload.bytes.len(),
        "Staged upload"
    );

    let loaded = load_pdf(staged.path(), page_range);
    if let Err(error) = staged.close() {
        tracing::warn!(error = %error, "Failed to remove staged upload");
    }
    Ok(loaded?)
}

fn staged_suffix(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| ".pdf".to_string())
}

fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Counts the model calls issued for one request.
struct CountingModel<'a> {
    inner: &'a dyn ChatModel,
    calls: AtomicUsize,
}

impl<'a> CountingModel<'a> {
    fn new(inner: &'a dyn ChatModel) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChatModel for CountingModel<'_> {
    async fn complete(&self, prompt: &str, config: &ChainConfig) -> Result<String, ChatModelError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.complete(prompt, config).await
    }
}
