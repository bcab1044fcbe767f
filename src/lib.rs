#![deny(missing_docs)]

//! Core library for the Document Analyzer: PDF summarization and map-reduce question answering.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// PDF text extraction with page-range selection.
pub mod document;
/// Chat-model capability and provider adapters.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Model Context Protocol server implementation.
pub mod mcp;
/// Analysis metrics helpers.
pub mod metrics;
/// Analysis pipeline: chunking, prompts, map-reduce, summarization.
pub mod processing;
