//! MCP server surface for the gateway.
//!
//! Implements RMCP's `ServerHandler` over [`MetaToolHandler`]:
//! - the six meta-tools
//! - the `mcp-discovery-usage-guide` prompt
//! - static documentation resources under `discovery://docs/`
//! - per-server and per-tool resources under `discovery://servers/`

use std::sync::Arc;

use rmcp::{
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, Content, GetPromptRequestParam,
        GetPromptResult, JsonObject, ListPromptsResult, ListResourceTemplatesResult,
        ListResourcesResult, ListToolsResult, PaginatedRequestParam, Prompt, PromptMessage,
        PromptMessageRole, RawResource, RawResourceTemplate, ReadResourceRequestParam,
        ReadResourceResult, Resource, ResourceContents, ResourceTemplate, ServerCapabilities,
        ServerInfo, Tool,
    },
    service::{RequestContext, RoleServer},
    ErrorData, ServerHandler, ServiceExt,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::{
    core::DiscoveryEngine,
    error::{DiscoveryError, DiscoveryResult},
    meta::MetaToolHandler,
};

pub const USAGE_GUIDE_PROMPT: &str = "mcp-discovery-usage-guide";

pub const USAGE_GUIDE_URI: &str = "discovery://docs/usage-guide";
pub const QUICK_REFERENCE_URI: &str = "discovery://docs/quick-reference";
pub const TROUBLESHOOTING_URI: &str = "discovery://docs/troubleshooting";

const SERVERS_PREFIX: &str = "discovery://servers/";

const MARKDOWN: &str = "text/markdown";
const JSON: &str = "application/json";

const USAGE_GUIDE: &str = include_str!("../docs/usage-guide.md");
const QUICK_REFERENCE: &str = include_str!("../docs/quick-reference.md");
const TROUBLESHOOTING: &str = include_str!("../docs/troubleshooting.md");

const INSTRUCTIONS: &str = "Gateway to the tools of several MCP servers. Call search_tools to \
                            find a tool, get_tool_details for its parameters, then execute_tool \
                            to run it.";

/// A resource URI this server knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceUri<'a> {
    Document(&'static str),
    ServerInfo(&'a str),
    ServerTools(&'a str),
    ToolDocumentation(&'a str, &'a str),
}

impl<'a> ResourceUri<'a> {
    fn parse(uri: &'a str) -> Option<Self> {
        match uri {
            USAGE_GUIDE_URI => return Some(Self::Document(USAGE_GUIDE)),
            QUICK_REFERENCE_URI => return Some(Self::Document(QUICK_REFERENCE)),
            TROUBLESHOOTING_URI => return Some(Self::Document(TROUBLESHOOTING)),
            _ => {}
        }

        let rest = uri.strip_prefix(SERVERS_PREFIX)?;
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        match segments[..] {
            [server, "info"] => Some(Self::ServerInfo(server)),
            [server, "tools"] => Some(Self::ServerTools(server)),
            [server, "tools", tool] => Some(Self::ToolDocumentation(server, tool)),
            _ => None,
        }
    }
}

/// Serves the meta-tools, prompt and resources of one [`DiscoveryEngine`] over MCP.
#[derive(Clone)]
pub struct DiscoveryServer {
    handler: MetaToolHandler,
}

impl DiscoveryServer {
    pub fn new(engine: Arc<DiscoveryEngine>) -> Self {
        Self {
            handler: MetaToolHandler::new(engine),
        }
    }

    pub fn handler(&self) -> &MetaToolHandler {
        &self.handler
    }

    /// Serve on stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> DiscoveryResult<()> {
        info!("Starting MCP discovery server on stdio");
        let running = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;
        let reason = running
            .waiting()
            .await
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;
        info!(reason = ?reason, "MCP discovery server stopped");
        Ok(())
    }

    // ========================================================================
    // Definitions
    // ========================================================================

    pub fn tools() -> Vec<Tool> {
        MetaToolHandler::tool_definitions()
            .into_iter()
            .map(|definition| {
                let schema = match definition.input_schema {
                    Value::Object(map) => map,
                    _ => JsonObject::new(),
                };
                Tool::new(definition.name, definition.description, Arc::new(schema))
            })
            .collect()
    }

    pub fn prompts() -> Vec<Prompt> {
        vec![Prompt::new(
            USAGE_GUIDE_PROMPT,
            Some("How to find and run backend tools through the discovery gateway"),
            None,
        )]
    }

    pub fn resources() -> Vec<Resource> {
        [
            (
                USAGE_GUIDE_URI,
                "Usage guide",
                "Workflow for finding, inspecting and executing tools.",
            ),
            (
                QUICK_REFERENCE_URI,
                "Quick reference",
                "The meta-tools, their arguments and the execution error codes.",
            ),
            (
                TROUBLESHOOTING_URI,
                "Troubleshooting",
                "Common connection and execution problems and how to resolve them.",
            ),
        ]
        .into_iter()
        .map(|(uri, name, description)| {
            let mut resource = RawResource::new(uri, name);
            resource.description = Some(description.to_string());
            resource.mime_type = Some(MARKDOWN.to_string());
            resource.no_annotation()
        })
        .collect()
    }

    pub fn resource_templates() -> Vec<ResourceTemplate> {
        [
            (
                "discovery://servers/{server}/info",
                "Server information",
                "Description, connection status, last error and tool counts of one server.",
            ),
            (
                "discovery://servers/{server}/tools",
                "Server tools",
                "Every enabled tool of one server.",
            ),
            (
                "discovery://servers/{server}/tools/{tool}",
                "Tool documentation",
                "Description, parameters and input schema of one tool.",
            ),
        ]
        .into_iter()
        .map(|(uri_template, name, description)| {
            RawResourceTemplate {
                uri_template: uri_template.to_string(),
                name: name.to_string(),
                title: None,
                description: Some(description.to_string()),
                mime_type: Some(JSON.to_string()),
            }
            .no_annotation()
        })
        .collect()
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Run a meta-tool. Failures come back as an error result carrying `{"error": ...}`.
    pub async fn run_tool(&self, name: &str, arguments: Option<JsonObject>) -> CallToolResult {
        let args = Value::Object(arguments.unwrap_or_default());
        match self.handler.call(name, &args).await {
            Ok(value) => {
                info!(tool = name, "Meta-tool executed");
                CallToolResult::success(vec![Content::text(to_pretty(&value))])
            }
            Err(e) => {
                error!(tool = name, error = %e, "Meta-tool failed");
                CallToolResult::error(vec![Content::text(to_pretty(
                    &json!({ "error": e.to_string() }),
                ))])
            }
        }
    }

    pub fn prompt(&self, name: &str) -> Result<GetPromptResult, ErrorData> {
        if name != USAGE_GUIDE_PROMPT {
            return Err(ErrorData::invalid_params(
                format!("Unknown prompt: {}", name),
                None,
            ));
        }
        Ok(GetPromptResult {
            description: None,
            messages: vec![PromptMessage::new_text(PromptMessageRole::User, USAGE_GUIDE)],
        })
    }

    pub fn read(&self, uri: &str) -> Result<ReadResourceResult, ErrorData> {
        let Some(resource) = ResourceUri::parse(uri) else {
            return Err(ErrorData::resource_not_found(
                format!("Unknown resource: {}", uri),
                None,
            ));
        };
        let engine = self.handler.engine();

        let (mime_type, text) = match resource {
            ResourceUri::Document(text) => (MARKDOWN, text.to_string()),
            ResourceUri::ServerInfo(server) => {
                let Some(metadata) = engine.list_servers().into_iter().find(|s| s.name == server)
                else {
                    return Err(server_not_found(server));
                };
                (JSON, to_json(&metadata)?)
            }
            ResourceUri::ServerTools(server) => {
                if !engine.list_servers().iter().any(|s| s.name == server) {
                    return Err(server_not_found(server));
                }
                let tools = engine.list_tools(server, false);
                (JSON, to_json(&json!({ "server": server, "tools": tools }))?)
            }
            ResourceUri::ToolDocumentation(server, tool) => {
                let Some(metadata) = engine.get_tool_details(server, tool) else {
                    return Err(ErrorData::resource_not_found(
                        format!("Tool '{}' not found on server '{}'", tool, server),
                        None,
                    ));
                };
                (JSON, to_json(&metadata)?)
            }
        };

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::TextResourceContents {
                uri: uri.to_string(),
                mime_type: Some(mime_type.to_string()),
                text,
                meta: None,
            }],
        })
    }
}

fn server_not_found(server: &str) -> ErrorData {
    ErrorData::resource_not_found(format!("Server '{}' not found", server), None)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ErrorData> {
    serde_json::to_string_pretty(value).map_err(|e| ErrorData::internal_error(e.to_string(), None))
}

fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

impl ServerHandler for DiscoveryServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder()
            .enable_tools()
            .enable_prompts()
            .enable_resources()
            .build();
        info.server_info.name = "mcp-discovery".to_string();
        info.server_info.version = env!("CARGO_PKG_VERSION").to_string();
        info.instructions = Some(INSTRUCTIONS.to_string());
        info
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(Self::tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run_tool(&request.name, request.arguments).await)
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, ErrorData> {
        Ok(ListPromptsResult::with_all_items(Self::prompts()))
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, ErrorData> {
        self.prompt(&request.name)
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        Ok(ListResourcesResult::with_all_items(Self::resources()))
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, ErrorData> {
        Ok(ListResourceTemplatesResult::with_all_items(
            Self::resource_templates(),
        ))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        self.read(&request.uri)
    }
}
