//! Connection retry with exponential backoff.

use std::{future::Future, time::Duration};

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use tracing::{error, info, warn};

use super::{backend::is_permanent_error, config::ConnectionConfig};
use crate::error::DiscoveryResult;

/// Retries connection attempts with exponential backoff.
#[derive(Debug, Clone)]
pub struct ReconnectionManager {
    /// Total attempts, including the first.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectionManager {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            ..Self::default()
        }
    }

    /// Delays double from `base_delay` up to `max_delay`; the attempt count, not elapsed
    /// time, ends the retries.
    fn policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(self.max_delay)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Run `connect_fn` until it succeeds, fails permanently, or attempts run out.
    pub async fn connect<F, Fut, T>(&self, server_name: &str, mut connect_fn: F) -> DiscoveryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DiscoveryResult<T>>,
    {
        let attempts = self.max_retries.max(1);
        let mut attempt = 0u32;

        backoff::future::retry(self.policy(), || {
            attempt += 1;
            let current = attempt;
            let pending = connect_fn();
            async move {
                match pending.await {
                    Ok(val) => {
                        if current > 1 {
                            info!(server = server_name, attempt = current, "Connected after retry");
                        }
                        Ok(val)
                    }
                    Err(e) if is_permanent_error(&e) => {
                        error!(
                            "Permanent error connecting to '{}': {} - not retrying",
                            server_name, e
                        );
                        Err(backoff::Error::permanent(e))
                    }
                    Err(e) if current >= attempts => {
                        warn!(
                            server = server_name,
                            attempts, "Giving up after {} attempt(s): {}", current, e
                        );
                        Err(backoff::Error::permanent(e))
                    }
                    Err(e) => {
                        warn!("Failed to connect to '{}', retrying: {}", server_name, e);
                        Err(backoff::Error::transient(e))
                    }
                }
            }
        })
        .await
    }
}
