//! Core types for the tool catalog.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::config::ServerConfig;

/// Unique tool identifier: `server_key:tool_name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedToolName {
    pub server_key: String,
    pub tool_name: String,
}

impl QualifiedToolName {
    pub fn new(server_key: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            server_key: server_key.into(),
            tool_name: tool_name.into(),
        }
    }
}

impl fmt::Display for QualifiedToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.server_key, self.tool_name)
    }
}

/// Connection state of a backend server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Unconnected,
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        self == ConnectionStatus::Connected
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Unconnected => "unconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Observed state of one backend server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tool_count: usize,
    pub enabled_count: usize,
    pub status: ConnectionStatus,
    /// Last connection or transport error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub config: ServerConfig,
}

/// One parameter of a tool, derived from its input schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameter {
    /// Extract parameters from a JSON schema's `properties` and `required` lists.
    ///
    /// Properties without a `type` are reported as `string`.
    pub fn from_schema(schema: &Value) -> Vec<ToolParameter> {
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return Vec::new();
        };
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        properties
            .iter()
            .map(|(name, prop)| ToolParameter {
                name: name.clone(),
                param_type: prop
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("string")
                    .to_string(),
                description: prop
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                required: required.contains(&name.as_str()),
                default: prop.get("default").cloned(),
            })
            .collect()
    }
}

/// One discoverable tool on one backend server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMetadata {
    pub server: String,
    /// Tool name with the server's prefix applied.
    pub name: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ToolParameter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ToolMetadata {
    pub fn new(server: impl Into<String>, name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            name: name.into(),
            summary: summary.into(),
            description: None,
            parameters: None,
            input_schema: None,
            enabled: true,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach an input schema and the parameter list derived from it.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.parameters = Some(ToolParameter::from_schema(&schema));
        self.input_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn qualified_name(&self) -> QualifiedToolName {
        QualifiedToolName::new(&self.server, &self.name)
    }
}

/// Query parameters shared by both search engines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub include_disabled: bool,
}

impl SearchOptions {
    #[must_use]
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_include_disabled(mut self, include: bool) -> Self {
        self.include_disabled = include;
        self
    }

    /// Server and enabled-state filter applied before scoring.
    pub fn admits(&self, tool: &ToolMetadata) -> bool {
        if let Some(server) = self.server.as_deref() {
            if tool.server != server {
                return false;
            }
        }
        self.include_disabled || tool.enabled
    }
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub server: String,
    pub tool: String,
    pub summary: String,
    /// Relevance in `[0, 1]`.
    pub relevance: f64,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl SearchResult {
    pub fn from_tool(tool: &ToolMetadata, relevance: f64) -> Self {
        Self {
            server: tool.server.clone(),
            tool: tool.name.clone(),
            summary: tool.summary.clone(),
            relevance,
            tags: tool.tags.clone(),
            input_schema: None,
        }
    }
}

/// Execution failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionErrorCode {
    ServerNotFound,
    ServerNotConnected,
    ServerDisconnected,
    ToolNotFound,
    ToolDisabled,
    InvalidArguments,
    ExecutionTimeout,
    ExecutionFailed,
}

impl ExecutionErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionErrorCode::ServerNotFound => "SERVER_NOT_FOUND",
            ExecutionErrorCode::ServerNotConnected => "SERVER_NOT_CONNECTED",
            ExecutionErrorCode::ServerDisconnected => "SERVER_DISCONNECTED",
            ExecutionErrorCode::ToolNotFound => "TOOL_NOT_FOUND",
            ExecutionErrorCode::ToolDisabled => "TOOL_DISABLED",
            ExecutionErrorCode::InvalidArguments => "INVALID_ARGUMENTS",
            ExecutionErrorCode::ExecutionTimeout => "EXECUTION_TIMEOUT",
            ExecutionErrorCode::ExecutionFailed => "EXECUTION_FAILED",
        }
    }
}

impl fmt::Display for ExecutionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub code: ExecutionErrorCode,
    pub message: String,
    pub server: String,
    pub tool: String,
}

/// Outcome of one tool execution. Failures are values, never `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}

impl ExecutionResult {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(
        code: ExecutionErrorCode,
        message: impl Into<String>,
        server: impl Into<String>,
        tool: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(ExecutionError {
                code,
                message: message.into(),
                server: server.into(),
                tool: tool.into(),
            }),
        }
    }

    pub fn error_code(&self) -> Option<ExecutionErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}
