//! MCP server entrypoint (stdio transport).
//!
//! Launches an MCP server that exposes the Document Analyzer's tools and resources over stdio.
//! Stdout carries the protocol, so logs go to the log file only. Runtime configuration is shared
//! with the HTTP binary.
use anyhow::{Context, Result};
use docanalyzer::{config, logging, mcp::DocAnalyzerMcpServer, processing};
use rmcp::{service::ServiceExt, transport::stdio};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    config::init_config();
    logging::init_tracing(logging::LogTarget::FileOnly);

    let analysis = processing::AnalysisService::new(config::get_config())
        .context("failed to initialize the chat model client")?;
    let server = DocAnalyzerMcpServer::new(Arc::new(analysis));

    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server over stdio")?;

    service
        .waiting()
        .await
        .context("MCP server terminated unexpectedly")?;

    Ok(())
}
