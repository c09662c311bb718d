//! Discovery metrics for monitoring operations.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for discovery operations.
#[derive(Debug, Default)]
pub struct DiscoveryMetrics {
    // Execution metrics
    total_executions: AtomicU64,
    successful_executions: AtomicU64,
    failed_executions: AtomicU64,
    active_executions: AtomicU64,

    // Connection metrics
    connection_errors: AtomicU64,
    active_connections: AtomicU64,

    // Cache metrics
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,

    // Lifecycle metrics
    reloads: AtomicU64,
}

impl DiscoveryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a tool execution.
    pub fn record_execution_start(&self) {
        self.total_executions.fetch_add(1, Ordering::Relaxed);
        self.active_executions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the end of a tool execution.
    pub fn record_execution_end(&self, success: bool) {
        self.active_executions.fetch_sub(1, Ordering::Relaxed);
        if success {
            self.successful_executions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_executions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connections_closed(&self, count: u64) {
        // never wraps below zero if close races a failed open
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(count))
            });
    }

    pub fn record_cache(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_reload(&self) {
        self.reloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_executions: self.total_executions.load(Ordering::Relaxed),
            successful_executions: self.successful_executions.load(Ordering::Relaxed),
            failed_executions: self.failed_executions.load(Ordering::Relaxed),
            active_executions: self.active_executions.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DiscoveryMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub active_executions: u64,
    pub connection_errors: u64,
    pub active_connections: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub reloads: u64,
}

impl MetricsSnapshot {
    /// Fraction of cache lookups served from cache.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_counters() {
        let metrics = DiscoveryMetrics::new();
        metrics.record_execution_start();
        metrics.record_execution_start();
        assert_eq!(metrics.snapshot().active_executions, 2);

        metrics.record_execution_end(true);
        metrics.record_execution_end(false);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_executions, 2);
        assert_eq!(snapshot.successful_executions, 1);
        assert_eq!(snapshot.failed_executions, 1);
        assert_eq!(snapshot.active_executions, 0);
    }

    #[test]
    fn test_connection_counters_saturate() {
        let metrics = DiscoveryMetrics::new();
        metrics.record_connection_opened();
        metrics.record_connections_closed(3);
        assert_eq!(metrics.snapshot().active_connections, 0);
    }

    #[test]
    fn test_cache_hit_rate() {
        let metrics = DiscoveryMetrics::new();
        assert_eq!(metrics.snapshot().cache_hit_rate(), 0.0);
        metrics.record_cache(true);
        metrics.record_cache(true);
        metrics.record_cache(true);
        metrics.record_cache(false);
        assert_eq!(metrics.snapshot().cache_hit_rate(), 0.75);
    }
}
