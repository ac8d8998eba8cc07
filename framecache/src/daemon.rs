//! Background daemon threads for periodic maintenance.
//!
//! Both the eviction registry and the reference cache need a housekeeping
//! thread that wakes up on an interval (enforcing the memory budget, sweeping
//! stale registry entries). [`PeriodicDaemon`] runs a task on a named thread
//! and can be shut down promptly: the wait between runs is a condition
//! variable, so `shutdown()` does not have to wait out the interval.

use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Shutdown flag shared between the daemon handle and its thread.
#[derive(Debug, Default)]
struct ShutdownSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl ShutdownSignal {
    fn trigger(&self) {
        let mut stopped = self.stopped.lock();
        *stopped = true;
        self.wake.notify_all();
    }

    /// Wait up to `timeout`. Returns `true` if shutdown was requested.
    ///
    /// A timeout too large to express as a deadline waits for shutdown only.
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut stopped = self.stopped.lock();
        while !*stopped {
            match deadline {
                Some(deadline) => {
                    if self.wake.wait_until(&mut stopped, deadline).timed_out() {
                        break;
                    }
                }
                None => self.wake.wait(&mut stopped),
            }
        }
        *stopped
    }
}

/// A named background thread that runs a task on a fixed interval.
///
/// The daemon is shut down by calling [`shutdown`](Self::shutdown) followed by
/// [`join`](Self::join), or simply by dropping it.
///
/// # Example
///
/// ```
/// use framecache::daemon::PeriodicDaemon;
/// use std::time::Duration;
///
/// let daemon = PeriodicDaemon::spawn("housekeeping", Duration::from_secs(60), || {
///     // periodic work
/// })
/// .unwrap();
/// assert!(daemon.is_running());
/// drop(daemon);
/// ```
pub struct PeriodicDaemon {
    name: String,
    signal: Arc<ShutdownSignal>,
    thread_handle: Option<JoinHandle<()>>,
}

impl PeriodicDaemon {
    /// Spawn a daemon thread running `task` every `interval`.
    ///
    /// The first run happens after one full interval.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the OS if the thread cannot be spawned.
    pub fn spawn<F>(name: &str, interval: Duration, mut task: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let signal = Arc::new(ShutdownSignal::default());
        let thread_signal = Arc::clone(&signal);
        let thread_name = name.to_string();

        let thread_handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                loop {
                    if thread_signal.wait(interval) {
                        debug!(daemon = %thread_name, "Daemon received shutdown signal");
                        break;
                    }
                    task();
                }
                debug!(daemon = %thread_name, "Daemon stopped");
            })?;

        info!(daemon = name, interval_ms = interval.as_millis() as u64, "Daemon started");

        Ok(Self {
            name: name.to_string(),
            signal,
            thread_handle: Some(thread_handle),
        })
    }

    /// Signal the daemon to shut down.
    ///
    /// Non-blocking; call [`join`](Self::join) to wait for the thread.
    pub fn shutdown(&self) {
        self.signal.trigger();
    }

    /// Wait for the daemon thread to finish.
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!(daemon = %self.name, "Daemon thread panicked: {:?}", e);
            }
        }
    }

    /// Check if the daemon thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Name the daemon thread was spawned with.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for PeriodicDaemon {
    fn drop(&mut self) {
        self.shutdown();
        self.join();
    }
}

impl std::fmt::Debug for PeriodicDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicDaemon")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}
