//! MCP server bootstrap and request dispatch.

use std::{borrow::Cow, sync::Arc};

use crate::{
    mcp::{
        format::{SettingsSnapshot, json_resource_contents, serialize_json},
        handlers::{
            analyze::{handle_query_document, handle_summarize_document},
            metrics::handle_metrics,
        },
        registry, schemas,
    },
    processing::AnalysisApi,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, ListResourcesResult, ListToolsResult,
        RawResource, ReadResourceRequestParam, ReadResourceResult, Resource, ServerCapabilities,
        ServerInfo, Tool, ToolAnnotations,
    },
};

const SETTINGS_URI: &str = "mcp://settings";
const USAGE_URI: &str = "mcp://usage";

/// MCP server implementation exposing the document analysis tools.
#[derive(Clone)]
pub struct DocAnalyzerMcpServer {
    analysis: Arc<dyn AnalysisApi>,
    registry: Arc<registry::Registry>,
}

impl DocAnalyzerMcpServer {
    /// Create a new MCP server using the supplied analysis pipeline.
    pub fn new(analysis: Arc<dyn AnalysisApi>) -> Self {
        let mut registry = registry::Registry::new();
        registry.register_resource(SETTINGS_URI, resource_settings);
        registry.register_resource(USAGE_URI, resource_usage);

        registry.register_tool("summarize-document", tool_summarize_document);
        registry.register_tool("query-document", tool_query_document);
        registry.register_tool("metrics", tool_metrics);

        Self {
            analysis,
            registry: Arc::new(registry),
        }
    }

    fn describe_tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: Cow::Borrowed("summarize-document"),
                title: Some("Summarize Document".to_string()),
                description: Some(Cow::Borrowed(
                    "Write a long, source-faithful summary of a local PDF, optionally restricted to a page range.",
                )),
                input_schema: Arc::new(schemas::summarize_input_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Summarize Document")
                        .read_only(true)
                        .idempotent(false)
                        .open_world(true),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("query-document"),
                title: Some("Query Document".to_string()),
                description: Some(Cow::Borrowed(
                    "Answer a question from a local PDF using map-reduce over its pages.",
                )),
                input_schema: Arc::new(schemas::query_input_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Query Document")
                        .read_only(true)
                        .idempotent(false)
                        .open_world(true),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("metrics"),
                title: Some("Metrics Snapshot".to_string()),
                description: Some(Cow::Borrowed(
                    "Check analysis volume and model call counts at a glance.",
                )),
                input_schema: Arc::new(schemas::empty_object_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Metrics Snapshot")
                        .read_only(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
        ]
    }

    fn describe_resources(&self) -> Vec<Resource> {
        let mut settings = RawResource::new(SETTINGS_URI, "settings");
        settings.description = Some("Effective model defaults (provider, model, endpoint)".into());

        let mut usage = RawResource::new(USAGE_URI, "usage");
        usage.description =
            Some("Recommended tool flow: summarize for overviews, query for specific facts.".into());

        vec![settings.no_annotation(), usage.no_annotation()]
    }
}

fn resource_settings(
    server: &DocAnalyzerMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    let defaults = server.analysis.chain_defaults();
    Box::pin(async move {
        let payload = SettingsSnapshot::from_chain(&defaults);
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                SETTINGS_URI,
                serialize_json(&payload, SETTINGS_URI),
            )],
        })
    })
}

fn resource_usage(
    _server: &DocAnalyzerMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    Box::pin(async move {
        let usage = serde_json::json!({
            "title": "Document Analyzer MCP Usage",
            "policy": [
                "Pass a local file path; do not paste document text into prompts.",
                "Narrow start_page/end_page for long documents; pages are 0-based and end is exclusive.",
                "Use summarize-document for overviews and query-document for specific questions.",
                "Hosted endpoints require api_key; local endpoints do not.",
            ],
            "flows": [
                {
                    "name": "Overview",
                    "steps": ["summarize-document({ path, start_page?, end_page? })"]
                },
                {
                    "name": "Question answering",
                    "steps": ["query-document({ path, query, start_page?, end_page? })"]
                }
            ]
        });
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                USAGE_URI,
                serialize_json(&usage, USAGE_URI),
            )],
        })
    })
}

fn tool_summarize_document(
    server: &DocAnalyzerMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let analysis = server.analysis.clone();
    Box::pin(async move { handle_summarize_document(&analysis, request.arguments).await })
}

fn tool_query_document(
    server: &DocAnalyzerMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let analysis = server.analysis.clone();
    Box::pin(async move { handle_query_document(&analysis, request.arguments).await })
}

fn tool_metrics(
    server: &DocAnalyzerMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let analysis = server.analysis.clone();
    Box::pin(async move { handle_metrics(&analysis).await })
}

impl ServerHandler for DocAnalyzerMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut implementation = rmcp::model::Implementation::from_build_env();
        implementation.name = "docanalyzer".to_string();
        implementation.title = Some("Document Analyzer MCP".to_string());
        implementation.version = env!("CARGO_PKG_VERSION").to_string();

        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: implementation,
            instructions: Some(
                "Use this server to summarize PDFs or answer questions about them. Point the tools at a local file and optionally restrict the page range.".into(),
            ),
            ..ServerInfo::default()
        }
    }

    fn list_resources(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        let resources = self.describe_resources();
        std::future::ready(Ok(ListResourcesResult::with_all_items(resources)))
    }

    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.describe_tools();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    #[allow(clippy::manual_async_fn)]
    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.resources.get(request.uri.as_str()) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown resource URI: {}", request.uri),
                None,
            ))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.tools.get(request.name.as_ref()) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!(
                    "Unknown tool: {}; available tools: {}",
                    request.name,
                    self.registry.tool_names().join(", ")
                ),
                None,
            ))
        }
    }
}
