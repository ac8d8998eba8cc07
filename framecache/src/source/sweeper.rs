//! Background sweeper for stale reference cache rows.

use super::{DataSource, ReferenceCache};
use crate::daemon::PeriodicDaemon;
use std::io;
use std::time::Duration;
use tracing::debug;

/// Periodically sweeps a [`ReferenceCache`] for rows whose item is gone.
///
/// Released handles remove their own rows, so the sweeper only finds rows
/// that outlived their item without a release. Dropping the sweeper stops it.
#[derive(Debug)]
pub struct RegistrySweeper {
    daemon: PeriodicDaemon,
}

impl RegistrySweeper {
    /// Start sweeping `cache` every `interval`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sweeper thread cannot be spawned.
    pub fn start<S: DataSource>(cache: ReferenceCache<S>, interval: Duration) -> io::Result<Self> {
        let daemon = PeriodicDaemon::spawn("registry-sweeper", interval, move || {
            let removed = cache.sweep();
            if removed == 0 {
                debug!("Registry sweep found no stale entries");
            }
        })?;
        Ok(Self { daemon })
    }

    /// Whether the sweeper thread is still running.
    pub fn is_running(&self) -> bool {
        self.daemon.is_running()
    }

    /// Stop the sweeper and wait for its thread.
    pub fn shutdown(mut self) {
        self.daemon.shutdown();
        self.daemon.join();
    }
}
