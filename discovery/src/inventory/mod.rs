//! Tool catalog: metadata types and the rule-aware metadata store.

pub mod catalog;
pub mod types;

pub use catalog::ToolMetadataManager;
pub use types::{
    ConnectionStatus, ExecutionError, ExecutionErrorCode, ExecutionResult, QualifiedToolName,
    SearchOptions, SearchResult, ServerMetadata, ToolMetadata, ToolParameter,
};
