//! Caller-facing meta-tools.
//!
//! Exposes the discovery engine as six tools taking flat JSON arguments, so that a client
//! sees a handful of stable tools instead of every backend tool:
//!
//! | Tool | Required | Optional |
//! |------|----------|----------|
//! | `list_mcp_servers` | | |
//! | `search_tools` | `query` | `server`, `limit`, `includeSchema` |
//! | `list_tools` | `server` | `includeDisabled` |
//! | `get_tool_details` | `server`, `tool` | |
//! | `execute_tool` | `server`, `tool`, `arguments` | |
//! | `refresh_cache` | | |
//!
//! Missing or mistyped arguments are returned as `Err`; everything the engine reports,
//! including failed executions, is returned as JSON.

use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::{
    core::DiscoveryEngine,
    error::{DiscoveryError, DiscoveryResult},
    inventory::{ConnectionStatus, SearchOptions},
};

pub const LIST_SERVERS: &str = "list_mcp_servers";
pub const SEARCH_TOOLS: &str = "search_tools";
pub const LIST_TOOLS: &str = "list_tools";
pub const GET_TOOL_DETAILS: &str = "get_tool_details";
pub const EXECUTE_TOOL: &str = "execute_tool";
pub const REFRESH_CACHE: &str = "refresh_cache";

/// Number of hits `search_tools` returns when no limit is given.
const DEFAULT_SEARCH_LIMIT: usize = 1;

/// Name, description and input schema of one meta-tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Dispatches meta-tool calls to a [`DiscoveryEngine`].
#[derive(Clone)]
pub struct MetaToolHandler {
    engine: Arc<DiscoveryEngine>,
}

impl MetaToolHandler {
    pub fn new(engine: Arc<DiscoveryEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<DiscoveryEngine> {
        &self.engine
    }

    pub fn tool_definitions() -> Vec<MetaToolDefinition> {
        vec![
            MetaToolDefinition {
                name: LIST_SERVERS,
                description: "List all MCP servers with their connection status and tool counts. \
                              Only connected servers can execute tools.",
                input_schema: object_schema(json!({}), &[]),
            },
            MetaToolDefinition {
                name: SEARCH_TOOLS,
                description: "Search for tools across all MCP servers with a natural language \
                              query. Returns the best match by default; raise limit to compare \
                              options and set includeSchema to get parameter schemas.",
                input_schema: object_schema(
                    json!({
                        "query": {
                            "type": "string",
                            "description": "What you need to do, e.g. \"create github issue\""
                        },
                        "server": {
                            "type": "string",
                            "description": "Only search this server"
                        },
                        "limit": {
                            "type": "number",
                            "description": "Maximum number of results (default: 1)"
                        },
                        "includeSchema": {
                            "type": "boolean",
                            "description": "Include each tool's input schema (default: false)"
                        }
                    }),
                    &["query"],
                ),
            },
            MetaToolDefinition {
                name: LIST_TOOLS,
                description: "List the tools of one MCP server.",
                input_schema: object_schema(
                    json!({
                        "server": {
                            "type": "string",
                            "description": "Exact server name from list_mcp_servers"
                        },
                        "includeDisabled": {
                            "type": "boolean",
                            "description": "Include disabled tools (default: false)"
                        }
                    }),
                    &["server"],
                ),
            },
            MetaToolDefinition {
                name: GET_TOOL_DETAILS,
                description: "Get the full description and parameter schema of one tool.",
                input_schema: object_schema(
                    json!({
                        "server": {"type": "string", "description": "Server the tool belongs to"},
                        "tool": {"type": "string", "description": "Tool name"}
                    }),
                    &["server", "tool"],
                ),
            },
            MetaToolDefinition {
                name: EXECUTE_TOOL,
                description: "Execute a tool on a connected MCP server.",
                input_schema: object_schema(
                    json!({
                        "server": {"type": "string", "description": "Server the tool belongs to"},
                        "tool": {"type": "string", "description": "Tool name"},
                        "arguments": {
                            "type": "object",
                            "description": "Arguments matching the tool's input schema"
                        }
                    }),
                    &["server", "tool", "arguments"],
                ),
            },
            MetaToolDefinition {
                name: REFRESH_CACHE,
                description: "Reconnect to every MCP server and rebuild the tool index.",
                input_schema: object_schema(json!({}), &[]),
            },
        ]
    }

    /// Run the meta-tool `name`.
    pub async fn call(&self, name: &str, args: &Value) -> DiscoveryResult<Value> {
        let args = Args::new(args)?;
        debug!(tool = name, "Meta-tool called");
        match name {
            LIST_SERVERS => self.list_servers(),
            SEARCH_TOOLS => self.search_tools(&args).await,
            LIST_TOOLS => self.list_tools(&args),
            GET_TOOL_DETAILS => self.get_tool_details(&args),
            EXECUTE_TOOL => self.execute_tool(&args).await,
            REFRESH_CACHE => self.refresh_cache().await,
            _ => Err(DiscoveryError::ToolNotFound(name.to_string())),
        }
    }

    fn list_servers(&self) -> DiscoveryResult<Value> {
        let servers = self.engine.list_servers();
        if servers.is_empty() {
            return Ok(json!({
                "servers": [],
                "message": "No MCP servers are configured or connected."
            }));
        }
        let connected = servers.iter().filter(|s| s.status.is_connected()).count();
        Ok(json!({
            "summary": format!(
                "Found {} server(s). {} connected, {} disconnected.",
                servers.len(),
                connected,
                servers.len() - connected
            ),
            "servers": serde_json::to_value(&servers)?,
        }))
    }

    async fn search_tools(&self, args: &Args<'_>) -> DiscoveryResult<Value> {
        let query = args.required_str("query")?;
        let mut options = SearchOptions::default()
            .with_limit(args.optional_usize("limit")?.unwrap_or(DEFAULT_SEARCH_LIMIT));
        if let Some(server) = args.optional_str("server")? {
            options = options.with_server(server);
        }
        let include_schema = args.optional_bool("includeSchema")?.unwrap_or(false);

        let results = self.engine.search_tools(query, &options).await;
        if results.is_empty() {
            return Ok(json!({
                "results": [],
                "message": format!("No tools found matching query: \"{}\"", query),
            }));
        }

        let statuses: HashMap<String, ConnectionStatus> = self
            .engine
            .list_servers()
            .into_iter()
            .map(|server| (server.name, server.status))
            .collect();

        let mut executable = 0;
        let mut hits = Vec::with_capacity(results.len());
        for result in results {
            let status = statuses.get(&result.server).copied();
            let connected = status.is_some_and(ConnectionStatus::is_connected);
            if connected {
                executable += 1;
            }
            let how_to_execute = if connected {
                format!(
                    "Use {} with server=\"{}\" and tool=\"{}\"",
                    EXECUTE_TOOL, result.server, result.tool
                )
            } else {
                format!(
                    "Server \"{}\" is not connected. Check {} for available servers.",
                    result.server, LIST_SERVERS
                )
            };

            let mut hit = json!({
                "server": result.server,
                "tool": result.tool,
                "summary": result.summary,
                "relevance": result.relevance,
                "tags": result.tags,
                "serverStatus": status.map_or_else(|| "unknown".to_string(), |s| s.to_string()),
                "executable": connected,
                "howToExecute": how_to_execute,
            });
            if include_schema {
                let schema = result.input_schema.or_else(|| {
                    self.engine
                        .get_tool_details(&result.server, &result.tool)
                        .and_then(|tool| tool.input_schema)
                });
                if let (Some(schema), Some(obj)) = (schema, hit.as_object_mut()) {
                    obj.insert("inputSchema".to_string(), schema);
                }
            }
            hits.push(hit);
        }

        let mut summary = format!("Found {} tool(s) matching \"{}\"", hits.len(), query);
        if executable == 0 {
            summary.push_str(" - none are on connected servers");
        } else if executable < hits.len() {
            summary.push_str(&format!(
                " ({} executable, {} require a server connection)",
                executable,
                hits.len() - executable
            ));
        }
        Ok(json!({ "results": hits, "summary": summary }))
    }

    fn list_tools(&self, args: &Args<'_>) -> DiscoveryResult<Value> {
        let server = args.required_str("server")?;
        let include_disabled = args.optional_bool("includeDisabled")?.unwrap_or(false);
        let tools = self.engine.list_tools(server, include_disabled);
        Ok(json!({ "tools": serde_json::to_value(&tools)? }))
    }

    fn get_tool_details(&self, args: &Args<'_>) -> DiscoveryResult<Value> {
        let server = args.required_str("server")?;
        let tool = args.required_str("tool")?;

        let Some(metadata) = self.engine.get_tool_details(server, tool) else {
            return Ok(json!({
                "tool": null,
                "error": format!(
                    "Tool \"{}\" not found on server \"{}\". Use {} to find available tools.",
                    tool, server, SEARCH_TOOLS
                ),
            }));
        };

        let how_to_execute = if self.engine.server_status(server).is_connected() {
            format!(
                "Use {} with server=\"{}\" and tool=\"{}\" and your arguments",
                EXECUTE_TOOL, server, tool
            )
        } else {
            format!("Server \"{}\" is not connected; this tool cannot be executed.", server)
        };
        Ok(json!({
            "tool": serde_json::to_value(&metadata)?,
            "howToExecute": how_to_execute,
        }))
    }

    async fn execute_tool(&self, args: &Args<'_>) -> DiscoveryResult<Value> {
        let server = args.required_str("server")?;
        let tool = args.required_str("tool")?;
        let arguments = args.required("arguments")?.clone();

        let result = self.engine.execute_tool(server, tool, arguments).await;
        Ok(serde_json::to_value(&result)?)
    }

    async fn refresh_cache(&self) -> DiscoveryResult<Value> {
        match self.engine.refresh().await {
            Ok(summary) => {
                let servers: Vec<Value> = self
                    .engine
                    .list_servers()
                    .into_iter()
                    .map(|s| json!({"name": s.name, "status": s.status, "toolCount": s.tool_count}))
                    .collect();
                Ok(json!({
                    "success": true,
                    "message": "Cache refreshed successfully",
                    "serversConnected": summary.servers_connected,
                    "totalServers": summary.total_servers,
                    "totalTools": summary.total_tools,
                    "servers": servers,
                }))
            }
            Err(e) => {
                warn!("Cache refresh failed: {}", e);
                Ok(json!({
                    "success": false,
                    "error": e.to_string(),
                    "message": "Failed to refresh cache",
                }))
            }
        }
    }
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Flat argument object of one meta-tool call.
struct Args<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Args<'a> {
    /// `null` is treated as an empty object.
    fn new(args: &'a Value) -> DiscoveryResult<Self> {
        match args {
            Value::Null => Ok(Self { map: None }),
            Value::Object(map) => Ok(Self { map: Some(map) }),
            _ => Err(DiscoveryError::InvalidArguments(
                "arguments must be an object".to_string(),
            )),
        }
    }

    /// Present and non-null.
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map?.get(key).filter(|value| !value.is_null())
    }

    fn required(&self, key: &str) -> DiscoveryResult<&'a Value> {
        self.get(key)
            .ok_or_else(|| DiscoveryError::MissingParameter(key.to_string()))
    }

    /// Empty strings count as missing.
    fn required_str(&self, key: &str) -> DiscoveryResult<&'a str> {
        match self.optional_str(key)? {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(DiscoveryError::MissingParameter(key.to_string())),
        }
    }

    fn optional_str(&self, key: &str) -> DiscoveryResult<Option<&'a str>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.as_str())),
            Some(_) => Err(type_error(key, "a string")),
        }
    }

    fn optional_bool(&self, key: &str) -> DiscoveryResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(value)) => Ok(Some(*value)),
            Some(_) => Err(type_error(key, "a boolean")),
        }
    }

    fn optional_usize(&self, key: &str) -> DiscoveryResult<Option<usize>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| type_error(key, "a non-negative integer")),
        }
    }
}

fn type_error(key: &str, expected: &str) -> DiscoveryError {
    DiscoveryError::InvalidArguments(format!("{} must be {}", key, expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        config::DiscoveryConfig,
        engine::tests::{github_tools, jira_tools, servers, MockConnector, MockServer},
    };

    async fn handler() -> MetaToolHandler {
        let connector = MockConnector::default()
            .with("github", MockServer::Ok(github_tools()))
            .with("jira", MockServer::Fail("exited".to_string()));
        let engine = DiscoveryEngine::new(DiscoveryConfig::default(), servers(), Arc::new(connector));
        engine.initialize().await.unwrap();
        MetaToolHandler::new(Arc::new(engine))
    }

    #[test]
    fn test_tool_definitions() {
        let definitions = MetaToolHandler::tool_definitions();
        let names: Vec<&str> = definitions.iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![LIST_SERVERS, SEARCH_TOOLS, LIST_TOOLS, GET_TOOL_DETAILS, EXECUTE_TOOL, REFRESH_CACHE]
        );
        let execute = &definitions[4];
        assert_eq!(execute.input_schema["required"], json!(["server", "tool", "arguments"]));
        let serialized = serde_json::to_value(&definitions[1]).unwrap();
        assert_eq!(serialized["inputSchema"]["required"], json!(["query"]));
    }

    #[tokio::test]
    async fn test_missing_parameters_are_errors() {
        let handler = handler().await;
        let cases = [
            (SEARCH_TOOLS, json!({}), "query"),
            (SEARCH_TOOLS, json!({"query": ""}), "query"),
            (LIST_TOOLS, json!({"includeDisabled": true}), "server"),
            (GET_TOOL_DETAILS, json!({"server": "github"}), "tool"),
            (EXECUTE_TOOL, json!({"server": "github", "tool": "echo"}), "arguments"),
            (EXECUTE_TOOL, json!({"tool": "echo", "arguments": {}}), "server"),
        ];
        for (tool, args, missing) in cases {
            let err = handler.call(tool, &args).await.unwrap_err();
            assert_eq!(err.to_string(), format!("Missing required parameter: {}", missing));
        }
    }

    #[tokio::test]
    async fn test_wrong_argument_types() {
        let handler = handler().await;
        assert!(matches!(
            handler.call(SEARCH_TOOLS, &json!({"query": "x", "limit": -1})).await,
            Err(DiscoveryError::InvalidArguments(_))
        ));
        assert!(matches!(
            handler.call(LIST_TOOLS, &json!({"server": 7})).await,
            Err(DiscoveryError::InvalidArguments(_))
        ));
        assert!(matches!(
            handler.call(LIST_SERVERS, &json!("nope")).await,
            Err(DiscoveryError::InvalidArguments(_))
        ));
        assert!(matches!(
            handler.call("launch_rockets", &json!({})).await,
            Err(DiscoveryError::ToolNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_servers() {
        let handler = handler().await;
        let value = handler.call(LIST_SERVERS, &Value::Null).await.unwrap();
        assert_eq!(value["servers"][0]["name"], "github");
        assert_eq!(value["servers"][0]["status"], "connected");
        assert_eq!(value["servers"][1]["status"], "error");
        assert_eq!(value["summary"], "Found 2 server(s). 1 connected, 1 disconnected.");
    }

    #[tokio::test]
    async fn test_search_defaults_to_best_hit() {
        let handler = handler().await;
        let value = handler
            .call(SEARCH_TOOLS, &json!({"query": "create issue"}))
            .await
            .unwrap();
        let results = value["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["tool"], "create_issue");
        assert_eq!(results[0]["executable"], true);
        assert_eq!(results[0]["serverStatus"], "connected");
        assert!(results[0].get("inputSchema").is_none());
    }

    #[tokio::test]
    async fn test_search_with_schema_and_limit() {
        let handler = handler().await;
        let value = handler
            .call(
                SEARCH_TOOLS,
                &json!({"query": "github", "limit": 0, "includeSchema": true}),
            )
            .await
            .unwrap();
        let results = value["results"].as_array().unwrap();
        assert_eq!(results.len(), 5);
        let create = results.iter().find(|r| r["tool"] == "create_issue").unwrap();
        assert_eq!(create["inputSchema"]["required"], json!(["title"]));
    }

    #[tokio::test]
    async fn test_search_without_hits() {
        let handler = handler().await;
        let value = handler
            .call(SEARCH_TOOLS, &json!({"query": "kubernetes"}))
            .await
            .unwrap();
        assert_eq!(value["results"], json!([]));
        assert!(value["message"].as_str().unwrap().contains("kubernetes"));
    }

    #[tokio::test]
    async fn test_list_tools_and_details() {
        let handler = handler().await;
        let value = handler
            .call(LIST_TOOLS, &json!({"server": "github"}))
            .await
            .unwrap();
        assert_eq!(value["tools"].as_array().unwrap().len(), 5);

        let value = handler
            .call(GET_TOOL_DETAILS, &json!({"server": "github", "tool": "create_issue"}))
            .await
            .unwrap();
        assert_eq!(value["tool"]["name"], "create_issue");
        assert_eq!(value["tool"]["inputSchema"]["type"], "object");
        assert!(value["howToExecute"].as_str().unwrap().contains(EXECUTE_TOOL));

        let value = handler
            .call(GET_TOOL_DETAILS, &json!({"server": "github", "tool": "missing"}))
            .await
            .unwrap();
        assert!(value["tool"].is_null());
        assert!(value["error"].is_string());
    }

    #[tokio::test]
    async fn test_execute_tool_returns_result_shape() {
        let handler = handler().await;
        let value = handler
            .call(
                EXECUTE_TOOL,
                &json!({"server": "github", "tool": "echo", "arguments": {"x": 1}}),
            )
            .await
            .unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["result"]["arguments"], json!({"x": 1}));

        let value = handler
            .call(
                EXECUTE_TOOL,
                &json!({"server": "jira", "tool": "create_ticket", "arguments": {}}),
            )
            .await
            .unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "SERVER_NOT_CONNECTED");
        assert_eq!(value["error"]["server"], "jira");
    }

    #[tokio::test]
    async fn test_refresh_cache() {
        let connector = MockConnector::default()
            .with("github", MockServer::Ok(github_tools()))
            .with("jira", MockServer::Ok(jira_tools()));
        let engine = DiscoveryEngine::new(DiscoveryConfig::default(), servers(), Arc::new(connector));
        engine.initialize().await.unwrap();
        let handler = MetaToolHandler::new(Arc::new(engine));

        let value = handler.call(REFRESH_CACHE, &json!({})).await.unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["serversConnected"], 2);
        assert_eq!(value["totalTools"], 6);
        assert_eq!(value["servers"][1], json!({"name": "jira", "status": "connected", "toolCount": 1}));
        assert_eq!(handler.engine().metrics().reloads, 1);

        handler.engine().dispose().await;
        let value = handler.call(REFRESH_CACHE, &json!({})).await.unwrap();
        assert_eq!(value["success"], false);
    }
}
