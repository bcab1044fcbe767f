//! Model Context Protocol (MCP) integration for the Document Analyzer.
//!
//! This module wires the analysis pipeline into an MCP server so editors and agent hosts can
//! summarize and query local PDFs over stdio. The surface area consists of:
//!
//! - Tools: `summarize-document`, `query-document`, and `metrics`.
//! - Resources: `mcp://settings` (effective model defaults) and `mcp://usage`.
//!
//! Handlers, schemas, and formatting helpers are kept in focused submodules to make tests and
//! reviews small and targeted.

mod format;
pub mod handlers;
mod registry;
mod schemas;
mod server;

pub use server::DocAnalyzerMcpServer;
