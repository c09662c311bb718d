//! Discovery error types.
//!
//! Defines error variants for configuration, connection, lookup and caller-input
//! failures. Tool execution failures are not errors here: they are reported as
//! data through [`ExecutionResult`](crate::inventory::ExecutionResult).

use thiserror::Error;

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Server disconnected: {0}")]
    ServerDisconnected(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {}", .0.join("; "))]
    Config(Vec<String>),

    #[error(transparent)]
    InvalidPattern(#[from] PatternError),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Pattern compilation errors.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid regular expression '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unsupported regular expression flag '{flag}' in '{pattern}'")]
    UnknownFlag { pattern: String, flag: char },
}

/// Embedding subsystem errors.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// `initialize()` has not completed successfully.
    #[error("Embedding model not initialized")]
    ModelNotInitialized,

    #[error("Embedding request failed: {0}")]
    Request(String),

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        EmbeddingError::Request(err.to_string())
    }
}
