//! Background eviction daemon.
//!
//! Enforces an eviction registry's memory budget on a fixed interval, so
//! frame buffers registered from hot paths never pay for eviction inline.

use super::EvictionRegistry;
use crate::daemon::PeriodicDaemon;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Periodically calls [`EvictionRegistry::evict_if_over_limit`].
///
/// Dropping the daemon stops it.
#[derive(Debug)]
pub struct EvictionDaemon {
    daemon: PeriodicDaemon,
}

impl EvictionDaemon {
    /// Start enforcing `registry`'s budget every `interval`.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon thread cannot be spawned.
    pub fn start(registry: Arc<dyn EvictionRegistry>, interval: Duration) -> io::Result<Self> {
        let daemon = PeriodicDaemon::spawn("eviction-daemon", interval, move || {
            let evicted = registry.evict_if_over_limit();
            if evicted > 0 {
                let stats = registry.stats();
                debug!(
                    evicted,
                    current_bytes = stats.current_bytes,
                    max_bytes = stats.max_bytes,
                    "Eviction cycle finished"
                );
            }
        })?;
        Ok(Self { daemon })
    }

    /// Whether the daemon thread is still running.
    pub fn is_running(&self) -> bool {
        self.daemon.is_running()
    }

    /// Stop the daemon and wait for its thread.
    pub fn shutdown(mut self) {
        self.daemon.shutdown();
        self.daemon.join();
    }
}
