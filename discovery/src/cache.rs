//! Keyed cache with per-entry expiry.
//!
//! [`ExpiringMap`] is a concurrent map whose entries either carry an absolute expiry or
//! are kept until invalidated. Expiry is checked lazily on read; there is no background
//! sweep. [`CachingLayer`] puts the discovery key scheme on top of it:
//! `servers`, `tools:<server>` and `tool:<server>:<tool>`.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::inventory::{ServerMetadata, ToolMetadata};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// `None` never expires.
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

/// Concurrent string-keyed map with optional per-entry TTL.
#[derive(Debug)]
pub struct ExpiringMap<V> {
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V: Clone> ExpiringMap<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Store `value`; `ttl = None` keeps it until invalidated, as does a TTL too large for
    /// the clock to represent.
    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.entries
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Fetch a live entry, evicting it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        // re-check under the write lock; a concurrent writer may have refreshed it
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for ExpiringMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
enum CachedValue {
    Servers(Arc<Vec<ServerMetadata>>),
    Tools(Arc<Vec<ToolMetadata>>),
    Tool(Arc<ToolMetadata>),
}

pub const SERVERS_KEY: &str = "servers";

pub fn tools_key(server: &str) -> String {
    format!("tools:{}", server)
}

pub fn tool_key(server: &str, tool: &str) -> String {
    format!("tool:{}:{}", server, tool)
}

/// Discovery result cache.
///
/// Server lists and tool summaries are stored with a TTL; tool details are stored
/// until invalidated.
#[derive(Debug, Default)]
pub struct CachingLayer {
    store: ExpiringMap<CachedValue>,
}

impl CachingLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_server_list(&self, servers: Vec<ServerMetadata>, ttl: Duration) {
        self.store
            .insert(SERVERS_KEY, CachedValue::Servers(Arc::new(servers)), Some(ttl));
    }

    pub fn get_server_list(&self) -> Option<Arc<Vec<ServerMetadata>>> {
        match self.lookup(SERVERS_KEY)? {
            CachedValue::Servers(servers) => Some(servers),
            _ => None,
        }
    }

    pub fn cache_tool_summaries(&self, server: &str, tools: Vec<ToolMetadata>, ttl: Duration) {
        self.store
            .insert(tools_key(server), CachedValue::Tools(Arc::new(tools)), Some(ttl));
    }

    pub fn get_tool_summaries(&self, server: &str) -> Option<Arc<Vec<ToolMetadata>>> {
        match self.lookup(&tools_key(server))? {
            CachedValue::Tools(tools) => Some(tools),
            _ => None,
        }
    }

    pub fn cache_tool_details(&self, server: &str, tool: &str, metadata: ToolMetadata) {
        self.store.insert(
            tool_key(server, tool),
            CachedValue::Tool(Arc::new(metadata)),
            None,
        );
    }

    pub fn get_tool_details(&self, server: &str, tool: &str) -> Option<Arc<ToolMetadata>> {
        match self.lookup(&tool_key(server, tool))? {
            CachedValue::Tool(tool) => Some(tool),
            _ => None,
        }
    }

    pub fn invalidate(&self, key: &str) {
        if self.store.remove(key) {
            debug!(key, "Cache entry invalidated");
        }
    }

    pub fn invalidate_all(&self) {
        self.store.clear();
        debug!("Cache cleared");
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn lookup(&self, key: &str) -> Option<CachedValue> {
        let value = self.store.get(key);
        debug!(key, hit = value.is_some(), "Cache lookup");
        value
    }
}
