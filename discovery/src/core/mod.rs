//! Core discovery infrastructure: configuration, backend connections and the engine.

pub mod backend;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod reconnect;

pub use backend::{BackendConnector, BackendSession, BackendTool, StdioConnector};
pub use config::{
    CacheConfig, ConfigSource, ConfigurationLoader, ConnectionConfig, DiscoveryConfig,
    EmbeddingConfig, ExecutionConfig, GatewayConfig, SearchMode, ServerConfig, SourceType,
    ValidationResult,
};
pub use engine::{DiscoveryEngine, RefreshSummary};
pub use metrics::{DiscoveryMetrics, MetricsSnapshot};
pub use reconnect::ReconnectionManager;
