//! Discovery engine.
//!
//! Connects to every configured backend, builds the tool catalog and search indices, and
//! serves the discovery operations over them.
//!
//! ## State
//!
//! Everything derived from a connection pass (catalog, indices, sessions, cache) lives in one
//! immutable [`Snapshot`] behind an `ArcSwap`. `initialize` and `reload` build a complete new
//! snapshot and swap it in; readers never see a half-built catalog. Each snapshot owns its
//! cache, so a request that started on an older snapshot can only fill that snapshot's cache.
//!
//! Per-server connection status is kept separately in a `DashMap` so that a transport failure
//! seen during execution is visible immediately without a rebuild. Every status carries the
//! generation of the snapshot that produced it; a failure on a session from an older
//! generation is not allowed to overwrite the status of its replacement.
//!
//! ## Reloads
//!
//! Reloads are serialized. Each one runs under a child of the engine's shutdown token, and
//! starting a new reload cancels the token of the previous one, so a superseded reload stops
//! waiting on its backends and returns [`DiscoveryError::Cancelled`] without touching the
//! current snapshot. `dispose` cancels the shutdown token itself.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    backend::{BackendConnector, BackendSession, BackendTool},
    config::{ConfigurationLoader, ConnectionConfig, DiscoveryConfig, SearchMode, ServerConfig},
    metrics::{DiscoveryMetrics, MetricsSnapshot},
    reconnect::ReconnectionManager,
};
use crate::{
    cache::{CachingLayer, SERVERS_KEY},
    error::{DiscoveryError, DiscoveryResult},
    inventory::{
        ConnectionStatus, ExecutionErrorCode, ExecutionResult, SearchOptions, SearchResult,
        ServerMetadata, ToolMetadata, ToolMetadataManager,
    },
    rules::RuleSet,
    search::{Embedder, HttpEmbedder, SearchEngine, SearchStrategy, SemanticSearchEngine},
};

/// Everything one connection pass produced.
struct Snapshot {
    generation: u64,
    config: DiscoveryConfig,
    /// Configured servers, in configuration order.
    servers: Vec<ServerConfig>,
    catalog: ToolMetadataManager,
    fuzzy: SearchEngine,
    semantic: Option<SemanticSearchEngine>,
    sessions: HashMap<String, Arc<dyn BackendSession>>,
    cache: CachingLayer,
}

impl Snapshot {
    fn empty(generation: u64, config: DiscoveryConfig, servers: Vec<ServerConfig>) -> Self {
        Self {
            generation,
            config,
            servers,
            catalog: ToolMetadataManager::new(),
            fuzzy: SearchEngine::new(),
            semantic: None,
            sessions: HashMap::new(),
            cache: CachingLayer::new(),
        }
    }

    /// Servers visible to callers. A disabled engine exposes none.
    fn listed_servers(&self) -> &[ServerConfig] {
        if self.config.enabled {
            &self.servers
        } else {
            &[]
        }
    }

    fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.listed_servers().iter().find(|s| s.name == name)
    }

    fn search_strategy(&self) -> &dyn SearchStrategy {
        match &self.semantic {
            Some(semantic) => semantic,
            None => &self.fuzzy,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ServerState {
    status: ConnectionStatus,
    error: Option<String>,
    /// Snapshot generation this state belongs to.
    generation: u64,
}

impl ServerState {
    fn new(status: ConnectionStatus, error: Option<String>, generation: u64) -> Self {
        Self {
            status,
            error,
            generation,
        }
    }
}

/// A backend that connected and reported its tools.
struct ConnectedServer {
    session: Arc<dyn BackendSession>,
    tools: Vec<BackendTool>,
}

/// Outcome of [`DiscoveryEngine::refresh`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub total_servers: usize,
    pub servers_connected: usize,
    pub total_tools: usize,
}

pub struct DiscoveryEngine {
    connector: Arc<dyn BackendConnector>,
    /// Overrides the HTTP embedder built from configuration.
    embedder: Option<Arc<dyn Embedder>>,
    state: ArcSwap<Snapshot>,
    status: DashMap<String, ServerState>,
    /// Last snapshot generation handed out.
    generation: AtomicU64,
    /// Bumped whenever a status changes outside of a rebuild.
    status_epoch: AtomicU64,
    metrics: Arc<DiscoveryMetrics>,
    shutdown_token: CancellationToken,
    /// Token of the newest reload; cancelled when a newer one starts.
    reload_token: Mutex<CancellationToken>,
    reload_lock: tokio::sync::Mutex<()>,
    disposed: AtomicBool,
}

impl DiscoveryEngine {
    /// Create an engine. Nothing connects until [`initialize`](Self::initialize).
    pub fn new(
        config: DiscoveryConfig,
        servers: Vec<ServerConfig>,
        connector: Arc<dyn BackendConnector>,
    ) -> Self {
        Self {
            connector,
            embedder: None,
            state: ArcSwap::from_pointee(Snapshot::empty(0, config, servers)),
            status: DashMap::new(),
            generation: AtomicU64::new(0),
            status_epoch: AtomicU64::new(0),
            metrics: Arc::new(DiscoveryMetrics::new()),
            shutdown_token: CancellationToken::new(),
            reload_token: Mutex::new(CancellationToken::new()),
            reload_lock: tokio::sync::Mutex::new(()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Use `embedder` for semantic search instead of the configured HTTP endpoint.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> DiscoveryConfig {
        self.state.load().config.clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Current connection status of `server`.
    pub fn server_status(&self, server: &str) -> ConnectionStatus {
        self.status
            .get(server)
            .map(|state| state.status)
            .unwrap_or_default()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Connect to every configured server and build the catalog.
    ///
    /// Servers that fail to connect are recorded with status `error`; they never fail the
    /// whole call.
    pub async fn initialize(&self) -> DiscoveryResult<()> {
        let (config, servers) = self.current_config();
        validate(&config, &servers)?;
        self.rebuild(config, servers).await
    }

    /// Re-validate the configuration, reconnect every server and rebuild all indices.
    pub async fn reload(&self) -> DiscoveryResult<()> {
        let (config, servers) = self.current_config();
        validate(&config, &servers)?;
        self.rebuild(config, servers).await?;
        self.metrics.record_reload();
        Ok(())
    }

    /// Reload with a new configuration and server list.
    ///
    /// An invalid configuration, or a server list with duplicate names, is rejected before
    /// any connection is touched.
    pub async fn reload_with(
        &self,
        config: DiscoveryConfig,
        servers: Vec<ServerConfig>,
    ) -> DiscoveryResult<()> {
        validate(&config, &servers)?;
        self.rebuild(config, servers).await?;
        self.metrics.record_reload();
        Ok(())
    }

    /// Reload and summarize the result.
    pub async fn refresh(&self) -> DiscoveryResult<RefreshSummary> {
        self.reload().await?;
        let servers = self.list_servers();
        Ok(RefreshSummary {
            total_servers: servers.len(),
            servers_connected: servers.iter().filter(|s| s.status.is_connected()).count(),
            total_tools: servers.iter().map(|s| s.tool_count).sum(),
        })
    }

    /// Close every backend connection and cancel any reload in progress.
    ///
    /// Calling it again is a no-op.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Disposing discovery engine");
        self.shutdown_token.cancel();

        let _guard = self.reload_lock.lock().await;
        let current = self.state.load_full();
        let previous = self.state.swap(Arc::new(Snapshot::empty(
            self.next_generation(),
            current.config.clone(),
            current.servers.clone(),
        )));
        for mut state in self.status.iter_mut() {
            state.status = ConnectionStatus::Disconnected;
        }

        let closed = close_sessions(previous.sessions.values().cloned()).await;
        self.metrics.record_connections_closed(closed as u64);
        info!("Discovery engine disposed, {} connections closed", closed);
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current_config(&self) -> (DiscoveryConfig, Vec<ServerConfig>) {
        let snapshot = self.state.load();
        (snapshot.config.clone(), snapshot.servers.clone())
    }

    /// Cancel the previous reload and hand out a token for a new one.
    fn begin_reload(&self) -> CancellationToken {
        let token = self.shutdown_token.child_token();
        let previous = std::mem::replace(&mut *self.reload_token.lock(), token.clone());
        previous.cancel();
        token
    }

    async fn rebuild(&self, config: DiscoveryConfig, servers: Vec<ServerConfig>) -> DiscoveryResult<()> {
        let token = self.begin_reload();
        let _guard = tokio::select! {
            guard = self.reload_lock.lock() => guard,
            _ = token.cancelled() => return Err(cancelled()),
        };
        if token.is_cancelled() {
            return Err(cancelled());
        }

        let rules = RuleSet::compile(&config.tool_rules)?;

        if !config.enabled {
            info!("Discovery is disabled; no servers will be connected");
            let snapshot = Snapshot::empty(self.next_generation(), config, servers);
            self.install(snapshot, HashMap::new()).await;
            return Ok(());
        }

        let fresh = self.mark_connecting(&servers);
        let Some(mut outcomes) = self.connect_all(&servers, &config.connection, &token).await else {
            self.abandon(Vec::new(), &fresh).await;
            return Err(cancelled());
        };

        let generation = self.next_generation();
        let mut catalog = ToolMetadataManager::new();
        let mut sessions: HashMap<String, Arc<dyn BackendSession>> = HashMap::new();
        let mut statuses = HashMap::new();
        for server in &servers {
            let state = match outcomes.remove(&server.name) {
                Some(Ok(connected)) => {
                    debug!(
                        server = %server.name,
                        tools = connected.tools.len(),
                        "Indexing backend tools"
                    );
                    for tool in connected.tools {
                        catalog.add_tool(tool_metadata(server, tool));
                    }
                    sessions.insert(server.name.clone(), connected.session);
                    ServerState::new(ConnectionStatus::Connected, None, generation)
                }
                Some(Err(e)) => {
                    warn!(server = %server.name, "Failed to connect: {}", e);
                    self.metrics.record_connection_error();
                    ServerState::new(ConnectionStatus::Error, Some(e.to_string()), generation)
                }
                None => {
                    self.metrics.record_connection_error();
                    ServerState::new(
                        ConnectionStatus::Error,
                        Some("connection task failed".to_string()),
                        generation,
                    )
                }
            };
            statuses.insert(server.name.clone(), state);
        }
        catalog.apply_rules(&rules);

        let mut fuzzy = SearchEngine::new();
        fuzzy.index(catalog.get_all_tools(true));

        let semantic = tokio::select! {
            semantic = self.build_semantic(&config, catalog.get_all_tools(true)) => semantic,
            _ = token.cancelled() => None,
        };
        if token.is_cancelled() {
            self.abandon(sessions.into_values().collect(), &fresh).await;
            return Err(cancelled());
        }

        let connected = sessions.len();
        let total = servers.len();
        let tool_count = catalog.len();
        self.install(
            Snapshot {
                generation,
                config,
                servers,
                catalog,
                fuzzy,
                semantic,
                sessions,
                cache: CachingLayer::new(),
            },
            statuses,
        )
        .await;

        info!(
            "Discovery ready: {} of {} servers connected, {} tools indexed",
            connected, total, tool_count
        );
        Ok(())
    }

    /// Mark servers without a known state as connecting; returns the names marked.
    fn mark_connecting(&self, servers: &[ServerConfig]) -> Vec<String> {
        servers
            .iter()
            .filter(|server| !self.status.contains_key(&server.name))
            .map(|server| {
                self.status.insert(
                    server.name.clone(),
                    ServerState::new(ConnectionStatus::Connecting, None, 0),
                );
                server.name.clone()
            })
            .collect()
    }

    /// Undo a cancelled rebuild: close what it opened and forget states it introduced.
    async fn abandon(&self, sessions: Vec<Arc<dyn BackendSession>>, fresh: &[String]) {
        for name in fresh {
            self.status
                .remove_if(name, |_, state| state.status == ConnectionStatus::Connecting);
        }
        let closed = close_sessions(sessions).await;
        debug!("Reload cancelled, closed {} new connections", closed);
    }

    /// Fan out one connection task per server and collect every outcome.
    ///
    /// Returns `None` if `token` is cancelled first; sessions opened so far are closed.
    async fn connect_all(
        &self,
        servers: &[ServerConfig],
        settings: &ConnectionConfig,
        token: &CancellationToken,
    ) -> Option<HashMap<String, DiscoveryResult<ConnectedServer>>> {
        let retry = ReconnectionManager::from_config(settings);
        let timeout = Duration::from_secs(settings.connect_timeout_secs);

        let mut tasks = JoinSet::new();
        for server in servers {
            let connector = Arc::clone(&self.connector);
            let server = server.clone();
            let retry = retry.clone();
            tasks.spawn(async move {
                let outcome = connect_server(connector.as_ref(), &server, &retry, timeout).await;
                (server.name, outcome)
            });
        }

        let mut outcomes = HashMap::new();
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tasks.abort_all();
                    let mut opened: Vec<Arc<dyn BackendSession>> = outcomes
                        .into_values()
                        .filter_map(|outcome: DiscoveryResult<ConnectedServer>| outcome.ok())
                        .map(|connected| connected.session)
                        .collect();
                    // tasks that finished before the abort still hold open sessions
                    while let Some(next) = tasks.join_next().await {
                        if let Ok((_, Ok(connected))) = next {
                            opened.push(connected.session);
                        }
                    }
                    close_sessions(opened).await;
                    return None;
                }
                next = tasks.join_next() => match next {
                    None => break,
                    Some(Ok((name, outcome))) => {
                        outcomes.insert(name, outcome);
                    }
                    Some(Err(e)) => warn!("Connection task failed: {}", e),
                },
            }
        }
        Some(outcomes)
    }

    /// Build the semantic index, or `None` to serve fuzzy results.
    async fn build_semantic(
        &self,
        config: &DiscoveryConfig,
        tools: Vec<ToolMetadata>,
    ) -> Option<SemanticSearchEngine> {
        if config.search_mode != SearchMode::Semantic {
            return None;
        }
        let embedder: Arc<dyn Embedder> = match &self.embedder {
            Some(embedder) => Arc::clone(embedder),
            None => match HttpEmbedder::new(&config.embedding) {
                Ok(embedder) => Arc::new(embedder),
                Err(e) => {
                    warn!("Semantic search unavailable, using fuzzy search: {}", e);
                    return None;
                }
            },
        };

        let mut engine = SemanticSearchEngine::new(embedder);
        if let Err(e) = engine.initialize().await {
            warn!("Embedding model failed to initialize, using fuzzy search: {}", e);
            return None;
        }
        if let Err(e) = engine.index(tools).await {
            warn!("Semantic indexing failed, using fuzzy search: {}", e);
            return None;
        }
        Some(engine)
    }

    /// Swap in a finished snapshot and retire the previous one.
    ///
    /// The new snapshot starts with an empty cache; whatever the old one cached is dropped
    /// with it.
    async fn install(&self, snapshot: Snapshot, statuses: HashMap<String, ServerState>) {
        let opened = snapshot.sessions.len();
        let previous = self.state.swap(Arc::new(snapshot));

        self.status.retain(|name, _| statuses.contains_key(name));
        for (name, state) in statuses {
            self.status.insert(name, state);
        }

        for _ in 0..opened {
            self.metrics.record_connection_opened();
        }
        let closed = close_sessions(previous.sessions.values().cloned()).await;
        self.metrics.record_connections_closed(closed as u64);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All configured servers with their status and tool counts.
    pub fn list_servers(&self) -> Vec<ServerMetadata> {
        let snapshot = self.state.load_full();
        let caching = snapshot.config.cache.enabled;
        if caching {
            let cached = snapshot.cache.get_server_list();
            self.metrics.record_cache(cached.is_some());
            if let Some(servers) = cached {
                return Vec::clone(&servers);
            }
        }
        let epoch = self.status_epoch.load(Ordering::SeqCst);

        let servers: Vec<ServerMetadata> = snapshot
            .listed_servers()
            .iter()
            .map(|server| {
                let state = self
                    .status
                    .get(&server.name)
                    .map(|state| state.clone())
                    .unwrap_or_default();
                ServerMetadata {
                    name: server.name.clone(),
                    description: server.description.clone().unwrap_or_default(),
                    tool_count: snapshot.catalog.get_tool_count(&server.name),
                    enabled_count: snapshot.catalog.get_enabled_count(&server.name),
                    status: state.status,
                    error: state.error,
                    config: server.clone(),
                }
            })
            .collect();

        if caching {
            snapshot
                .cache
                .cache_server_list(servers.clone(), snapshot.config.cache.ttl());
            // a status changed while the list was assembled; don't keep it
            if self.status_epoch.load(Ordering::SeqCst) != epoch {
                snapshot.cache.invalidate(SERVERS_KEY);
            }
        }
        servers
    }

    /// Rank tools against `query` with the configured search engine.
    ///
    /// A semantic query that fails is answered by the fuzzy index instead.
    pub async fn search_tools(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        let snapshot = self.state.load_full();
        let strategy = snapshot.search_strategy();
        match strategy.search(query, options).await {
            Ok(results) => results,
            Err(e) => {
                warn!(
                    strategy = strategy.name(),
                    "Search failed, falling back to fuzzy search: {}", e
                );
                snapshot.fuzzy.search(query, options)
            }
        }
    }

    /// Tools of one server. Unknown servers yield an empty list.
    pub fn list_tools(&self, server: &str, include_disabled: bool) -> Vec<ToolMetadata> {
        let snapshot = self.state.load_full();
        let caching = snapshot.config.cache.enabled && !include_disabled;
        if caching {
            let cached = snapshot.cache.get_tool_summaries(server);
            self.metrics.record_cache(cached.is_some());
            if let Some(tools) = cached {
                return Vec::clone(&tools);
            }
        }

        if snapshot.server(server).is_none() {
            return Vec::new();
        }
        let tools = snapshot.catalog.get_tools_by_server(server, include_disabled);
        if caching {
            snapshot
                .cache
                .cache_tool_summaries(server, tools.clone(), snapshot.config.cache.ttl());
        }
        tools
    }

    /// Full metadata of one tool, or `None` if it is not in the catalog.
    pub fn get_tool_details(&self, server: &str, tool: &str) -> Option<ToolMetadata> {
        let snapshot = self.state.load_full();
        let caching = snapshot.config.cache.enabled;
        if caching {
            let cached = snapshot.cache.get_tool_details(server, tool);
            self.metrics.record_cache(cached.is_some());
            if let Some(metadata) = cached {
                return Some(ToolMetadata::clone(&metadata));
            }
        }

        snapshot.server(server)?;
        let metadata = snapshot.catalog.get_tool(server, tool)?.clone();
        if caching {
            snapshot.cache.cache_tool_details(server, tool, metadata.clone());
        }
        Some(metadata)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Execute a tool with the configured timeout.
    pub async fn execute_tool(&self, server: &str, tool: &str, arguments: Value) -> ExecutionResult {
        let timeout = Duration::from_secs(self.state.load().config.execution.timeout_secs);
        self.execute_tool_with_timeout(server, tool, arguments, timeout)
            .await
    }

    /// Execute a tool on its backend. Every failure is reported in the returned result.
    pub async fn execute_tool_with_timeout(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
        timeout: Duration,
    ) -> ExecutionResult {
        self.metrics.record_execution_start();
        let metrics = Arc::clone(&self.metrics);
        let mut succeeded = scopeguard::guard(false, move |success| {
            metrics.record_execution_end(success);
        });

        let result = self.execute_inner(server, tool, arguments, timeout).await;
        *succeeded = result.success;
        result
    }

    async fn execute_inner(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
        timeout: Duration,
    ) -> ExecutionResult {
        let failure = |code, message: String| ExecutionResult::failure(code, message, server, tool);
        let snapshot = self.state.load_full();

        let Some(server_config) = snapshot.server(server) else {
            return failure(
                ExecutionErrorCode::ServerNotFound,
                format!("Server '{}' is not configured", server),
            );
        };
        let status = self.server_status(server);
        let session = match snapshot.sessions.get(server) {
            Some(session) if status.is_connected() => Arc::clone(session),
            _ => {
                return failure(
                    ExecutionErrorCode::ServerNotConnected,
                    format!("Server '{}' is not connected (status: {})", server, status),
                )
            }
        };
        let Some(metadata) = snapshot.catalog.get_tool(server, tool) else {
            return failure(
                ExecutionErrorCode::ToolNotFound,
                format!("Tool '{}' not found on server '{}'", tool, server),
            );
        };
        if !metadata.enabled {
            return failure(
                ExecutionErrorCode::ToolDisabled,
                format!("Tool '{}' is disabled on server '{}'", tool, server),
            );
        }
        let Value::Object(arguments) = arguments else {
            return failure(
                ExecutionErrorCode::InvalidArguments,
                "Tool arguments must be a JSON object".to_string(),
            );
        };
        let backend_name = server_config.backend_tool_name(tool).unwrap_or(tool);

        debug!(server, tool, backend_name, "Executing tool");
        match tokio::time::timeout(timeout, session.call_tool(backend_name, arguments)).await {
            Err(_) => {
                warn!(server, tool, "Tool execution timed out after {:?}", timeout);
                failure(
                    ExecutionErrorCode::ExecutionTimeout,
                    format!("Tool execution timed out after {:?}", timeout),
                )
            }
            Ok(Ok(value)) => ExecutionResult::ok(value),
            Ok(Err(e @ (DiscoveryError::Transport(_) | DiscoveryError::ServerDisconnected(_)))) => {
                if self.mark_disconnected(server, snapshot.generation, &e) {
                    failure(ExecutionErrorCode::ServerDisconnected, e.to_string())
                } else {
                    failure(
                        ExecutionErrorCode::ExecutionFailed,
                        format!("Connection was replaced by a reload during the call: {}", e),
                    )
                }
            }
            Ok(Err(e)) => {
                debug!(server, tool, "Tool execution failed: {}", e);
                failure(ExecutionErrorCode::ExecutionFailed, e.to_string())
            }
        }
    }

    /// Record a connection lost mid-operation. Its tools stay indexed until the next reload.
    ///
    /// Returns `false`, changing nothing, when the failed session belongs to an older
    /// generation than the server's current status.
    fn mark_disconnected(&self, server: &str, generation: u64, error: &DiscoveryError) -> bool {
        {
            let Some(mut state) = self.status.get_mut(server) else {
                return false;
            };
            if state.generation != generation {
                debug!(server, "Ignoring failure of a replaced session: {}", error);
                return false;
            }
            *state = ServerState::new(
                ConnectionStatus::Disconnected,
                Some(error.to_string()),
                generation,
            );
        }
        warn!(server, "Server disconnected: {}", error);
        self.metrics.record_connection_error();
        self.status_epoch.fetch_add(1, Ordering::SeqCst);
        self.state.load().cache.invalidate(SERVERS_KEY);
        true
    }
}

fn validate(config: &DiscoveryConfig, servers: &[ServerConfig]) -> DiscoveryResult<()> {
    let mut errors = ConfigurationLoader::validate_config(config).errors;
    errors.extend(ConfigurationLoader::validate_servers(servers).errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DiscoveryError::Config(errors))
    }
}

fn cancelled() -> DiscoveryError {
    DiscoveryError::Cancelled("reload superseded or engine disposed".to_string())
}

async fn connect_server(
    connector: &dyn BackendConnector,
    server: &ServerConfig,
    retry: &ReconnectionManager,
    timeout: Duration,
) -> DiscoveryResult<ConnectedServer> {
    retry
        .connect(&server.name, || async move {
            tokio::time::timeout(timeout, open_session(connector, server))
                .await
                .map_err(|_| {
                    DiscoveryError::Timeout(format!(
                        "connecting to '{}' took longer than {:?}",
                        server.name, timeout
                    ))
                })?
        })
        .await
}

async fn open_session(
    connector: &dyn BackendConnector,
    server: &ServerConfig,
) -> DiscoveryResult<ConnectedServer> {
    let session = connector.connect(server).await?;
    match session.list_tools().await {
        Ok(tools) => Ok(ConnectedServer { session, tools }),
        Err(e) => {
            session.close().await;
            Err(e)
        }
    }
}

async fn close_sessions(sessions: impl IntoIterator<Item = Arc<dyn BackendSession>>) -> usize {
    let sessions: Vec<_> = sessions.into_iter().collect();
    join_all(sessions.iter().map(|session| session.close())).await;
    sessions.len()
}

/// Catalog entry for a backend tool, named as exposed by its server.
fn tool_metadata(server: &ServerConfig, tool: BackendTool) -> ToolMetadata {
    let summary = tool.description.clone().unwrap_or_default();
    let metadata = ToolMetadata::new(&server.name, server.exposed_tool_name(&tool.name), summary)
        .with_input_schema(tool.input_schema);
    match tool.description {
        Some(description) => metadata.with_description(description),
        None => metadata,
    }
}
