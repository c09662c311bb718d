//! Backend server connections.
//!
//! The engine talks to backends through [`BackendConnector`] and [`BackendSession`] so the
//! transport stays replaceable. [`StdioConnector`] launches each server as a child process
//! and speaks MCP over its stdio using `rmcp`.

use std::{borrow::Cow, io, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use rmcp::{
    model::CallToolRequestParam,
    service::RunningService,
    transport::{ConfigureCommandExt, TokioChildProcess},
    RoleClient, ServiceExt,
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::config::ServerConfig;
use crate::error::{DiscoveryError, DiscoveryResult};

type McpClient = RunningService<RoleClient, ()>;

/// A tool as reported by a backend, before prefixing and rule application.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

impl BackendTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

/// An established connection to one backend server.
///
/// `call_tool` errors are interpreted by the engine: [`DiscoveryError::Transport`] and
/// [`DiscoveryError::ServerDisconnected`] mean the connection is gone, anything else is a
/// failure of the individual call.
#[async_trait]
pub trait BackendSession: Send + Sync {
    async fn list_tools(&self) -> DiscoveryResult<Vec<BackendTool>>;

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> DiscoveryResult<Value>;

    /// Release the connection. Calling it twice is a no-op.
    async fn close(&self);
}

/// Opens sessions to configured servers.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self, server: &ServerConfig) -> DiscoveryResult<Arc<dyn BackendSession>>;
}

/// Launches servers as child processes and speaks MCP over stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioConnector;

impl StdioConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BackendConnector for StdioConnector {
    async fn connect(&self, server: &ServerConfig) -> DiscoveryResult<Arc<dyn BackendSession>> {
        info!(
            server = %server.name,
            command = %server.command,
            "Connecting to MCP server"
        );

        let transport = TokioChildProcess::new(
            tokio::process::Command::new(&server.command).configure(|cmd| {
                cmd.args(&server.args)
                    .envs(server.env.iter())
                    .stderr(std::process::Stdio::inherit());
            }),
        )
        .map_err(|e| spawn_error(&server.command, e))?;

        let client = ().serve(transport).await.map_err(|e| {
            DiscoveryError::ConnectionFailed(format!("initialize stdio client: {}", e))
        })?;

        info!(server = %server.name, "Connected to stdio server");
        Ok(Arc::new(StdioSession {
            server: server.name.clone(),
            client: Mutex::new(Some(Arc::new(client))),
        }))
    }
}

/// Readable message for a process launch failure.
pub fn spawn_error(command: &str, err: io::Error) -> DiscoveryError {
    match err.kind() {
        io::ErrorKind::NotFound => {
            DiscoveryError::ConnectionFailed(format!("Command not found: {}", command))
        }
        io::ErrorKind::PermissionDenied => {
            DiscoveryError::ConnectionFailed(format!("Permission denied: {}", command))
        }
        _ => DiscoveryError::Transport(format!("create stdio transport: {}", err)),
    }
}

/// Errors that retrying cannot fix.
pub fn is_permanent_error(error: &DiscoveryError) -> bool {
    match error {
        DiscoveryError::Config(_) | DiscoveryError::Cancelled(_) => true,
        DiscoveryError::ConnectionFailed(msg) => {
            msg.starts_with("Command not found") || msg.starts_with("Permission denied")
        }
        _ => false,
    }
}

struct StdioSession {
    server: String,
    client: Mutex<Option<Arc<McpClient>>>,
}

impl StdioSession {
    fn client(&self) -> DiscoveryResult<Arc<McpClient>> {
        self.client
            .lock()
            .clone()
            .ok_or_else(|| DiscoveryError::ServerDisconnected(self.server.clone()))
    }
}

#[async_trait]
impl BackendSession for StdioSession {
    async fn list_tools(&self) -> DiscoveryResult<Vec<BackendTool>> {
        let client = self.client()?;
        let tools = client
            .peer()
            .list_all_tools()
            .await
            .map_err(|e| DiscoveryError::Transport(format!("list tools: {}", e)))?;

        debug!(server = %self.server, count = tools.len(), "Listed backend tools");
        Ok(tools
            .into_iter()
            .map(|tool| BackendTool {
                name: tool.name.to_string(),
                description: tool.description.map(|d| d.to_string()),
                input_schema: Value::Object((*tool.input_schema).clone()),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> DiscoveryResult<Value> {
        let client = self.client()?;
        let request = CallToolRequestParam {
            name: Cow::Owned(name.to_string()),
            arguments: Some(arguments),
        };

        let result = client.call_tool(request).await.map_err(|e| match e {
            rmcp::ServiceError::McpError(data) => DiscoveryError::ToolExecution(data.message.to_string()),
            other => DiscoveryError::Transport(format!("call tool: {}", other)),
        })?;

        let is_error = result.is_error.unwrap_or(false);
        let payload = serde_json::to_value(&result)?;
        if is_error {
            return Err(DiscoveryError::ToolExecution(content_text(&payload)));
        }
        Ok(payload)
    }

    async fn close(&self) {
        let Some(client) = self.client.lock().take() else {
            return;
        };
        match Arc::try_unwrap(client) {
            Ok(client) => {
                if let Err(e) = client.cancel().await {
                    warn!(server = %self.server, "Error disconnecting: {}", e);
                }
            }
            Err(_) => {
                // dropping the last reference cancels the service
                warn!(
                    server = %self.server,
                    "Client still in use during close; it will shut down when released"
                );
            }
        }
    }
}

/// Join the text items of a tool result's `content`, or the raw content if there are none.
fn content_text(payload: &Value) -> String {
    let Some(content) = payload.get("content") else {
        return "tool reported an error".to_string();
    };
    let texts: Vec<&str> = content
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    if texts.is_empty() {
        content.to_string()
    } else {
        texts.join("\n")
    }
}
