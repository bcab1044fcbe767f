//! Core data types and error definitions for the analysis pipeline.

use crate::{
    config::{ChainOverrides, ConfigError},
    document::{ExtractionError, PageRange},
    llm::ChatModelError,
};
use anyhow::Error as TokenizerError;
use std::time::Duration;
use thiserror::Error;

use super::prompts::PromptError;

/// Errors produced while turning page text into token-bounded chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// The pipeline was configured with an impossible token budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Model we attempted to load a tokenizer for.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors surfaced by the map-reduce query engine.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No chunks were supplied.
    #[error("document has no text to query")]
    EmptyDocument,
    /// A map call failed.
    #[error("map step failed for chunk {chunk} (page {page}): {source}")]
    Map {
        /// Position of the chunk in the map input.
        chunk: usize,
        /// Source page of the chunk.
        page: usize,
        /// Underlying model failure.
        #[source]
        source: ChatModelError,
    },
    /// A collapse or final reduce call failed.
    #[error("reduce step failed: {source}")]
    Reduce {
        /// Underlying model failure.
        #[source]
        source: ChatModelError,
    },
    /// A single partial answer does not fit the reduce budget.
    #[error("partial answer needs {tokens} tokens but the reduce budget is {token_max}")]
    ContextOverflow {
        /// Tokens in the rendered prompt.
        tokens: usize,
        /// Configured budget.
        token_max: usize,
    },
    /// Collapsing did not converge under the budget.
    #[error("partial answers still exceed the budget after {passes} collapse passes")]
    CollapseLimit {
        /// Passes attempted.
        passes: usize,
    },
    /// A prompt template could not be rendered.
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Errors surfaced by the summarizer.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// No page text was supplied.
    #[error("document has no text to summarize")]
    EmptyDocument,
    /// The stuffed prompt exceeds the summarize budget.
    #[error("document needs {tokens} tokens but the summarize budget is {limit}; narrow the page range")]
    DocumentTooLong {
        /// Tokens in the rendered prompt.
        tokens: usize,
        /// Configured budget.
        limit: usize,
    },
    /// The model call failed.
    #[error("summarize request failed: {0}")]
    Model(#[from] ChatModelError),
    /// The prompt template could not be rendered.
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Errors raised by [`crate::processing::AnalysisService::run`].
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The request carried no file.
    #[error("Please upload a file.")]
    MissingFile,
    /// Query mode was selected with a blank query.
    #[error("A query is required when the mode is 'query'.")]
    EmptyQuery,
    /// Model configuration is incomplete or invalid.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
    /// The document could not be read or yielded no text.
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),
    /// Page text could not be chunked.
    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),
    /// The query pipeline failed.
    #[error("Query error: {0}")]
    Query(#[from] QueryError),
    /// The summarize call failed.
    #[error("Summarize error: {0}")]
    Summarize(#[from] SummarizeError),
    /// The upload could not be written to the staging directory.
    #[error("Failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),
    /// The blocking extraction task did not complete.
    #[error("Extraction worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// One token-bounded slice of page text fed to the map stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based source page index.
    pub page: usize,
    /// Chunk text.
    pub text: String,
}

/// What the caller wants done with the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Long, source-faithful summary in one model call.
    Summarize,
    /// Map-reduce answer to a free-text question.
    Query {
        /// The user's question.
        query: String,
    },
}

impl AnalysisMode {
    /// Lowercase label used in logs and responses.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Query { .. } => "query",
        }
    }
}

/// File received from the caller.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    /// Client-supplied file name, used only for the staged file's extension and logs.
    pub file_name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// Input to a single analysis.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Uploaded document.
    pub upload: Upload,
    /// Summarize or query.
    pub mode: AnalysisMode,
    /// Pages to analyze.
    pub page_range: PageRange,
    /// Per-request model overrides.
    pub overrides: ChainOverrides,
}

/// Result of a completed analysis.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// Final answer or summary text.
    pub text: String,
    /// Mode that produced the text.
    pub mode: AnalysisMode,
    /// Wall-clock processing time.
    pub elapsed: Duration,
    /// Number of pages analyzed.
    pub pages: usize,
    /// Number of chunks sent through the pipeline.
    pub chunks: usize,
    /// Number of model calls issued.
    pub model_calls: usize,
    /// SHA-256 of the uploaded bytes, hex encoded.
    pub document_id: String,
    /// RFC 3339 completion timestamp.
    pub completed_at: String,
}
