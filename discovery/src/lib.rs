//! Tool discovery and search gateway for Model Context Protocol (MCP) servers.
//!
//! Connects to a set of backend MCP servers, builds a searchable catalog of their tools and
//! exposes it through a handful of meta-tools, so a client can find and run any backend tool
//! without loading every tool definition up front.
//!
//! ## Modules
//!
//! - [`core`]: configuration, backend connections and the [`DiscoveryEngine`]
//! - [`inventory`]: tool catalog types and storage
//! - [`rules`]: pattern-based enable/disable and tagging of tools
//! - [`search`]: fuzzy and embedding-based tool search
//! - [`cache`]: TTL caches for listings and tool details
//! - [`meta`]: the caller-facing meta-tools
//! - [`server`]: the MCP server surface: meta-tools, usage prompt and documentation resources
//! - [`logging`]: tracing subscriber setup

pub mod cache;
pub mod error;
pub mod logging;
pub mod meta;
pub mod server;

// Subsystems
pub mod core;
pub mod inventory;
pub mod rules;
pub mod search;

pub use core::{
    BackendConnector, BackendSession, BackendTool, ConfigSource, ConfigurationLoader,
    DiscoveryConfig, DiscoveryEngine, DiscoveryMetrics, EmbeddingConfig, GatewayConfig,
    MetricsSnapshot, RefreshSummary, SearchMode, ServerConfig, SourceType, StdioConnector,
    ValidationResult,
};
pub use error::{DiscoveryError, DiscoveryResult, EmbeddingError, PatternError};
pub use inventory::{
    ConnectionStatus, ExecutionError, ExecutionErrorCode, ExecutionResult, QualifiedToolName,
    SearchOptions, SearchResult, ServerMetadata, ToolMetadata, ToolMetadataManager, ToolParameter,
};
pub use logging::{LogFormat, LoggingConfig};
pub use meta::{MetaToolDefinition, MetaToolHandler};
pub use rules::{Pattern, RuleSet, ToolRule};
pub use server::DiscoveryServer;
pub use search::{Embedder, HttpEmbedder, SearchEngine, SearchStrategy, SemanticSearchEngine};
