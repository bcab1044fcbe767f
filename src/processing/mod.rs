//! Analysis pipeline: chunking, prompts, map-reduce query, summarization, and orchestration.

pub mod chunking;
pub mod map_reduce;
pub mod prompts;
mod service;
pub mod summarize;
pub mod types;

#[cfg(test)]
mod test_support;

pub use map_reduce::MapReduceEngine;
pub use service::{AnalysisApi, AnalysisService, PipelineSettings};
pub use summarize::summarize;
pub use types::{
    AnalysisError, AnalysisMode, AnalysisOutcome, AnalysisRequest, Chunk, ChunkingError,
    QueryError, SummarizeError, Upload,
};
