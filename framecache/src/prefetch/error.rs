//! Error types for the prefetch module.

use super::ViewportId;
use std::io;
use thiserror::Error;

/// Errors that can occur during prefetch operations.
#[derive(Debug, Error)]
pub enum PrefetchError {
    /// `configure()` was called after the scheduler started.
    #[error("prefetch configuration cannot be changed after the scheduler has started")]
    ConfigurationLocked,

    /// A configuration value is out of range.
    #[error("invalid prefetch configuration: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// The viewport was never added or has been removed.
    #[error("unknown viewport {0}")]
    UnknownViewport(ViewportId),

    /// A prefetch target failed to retrieve or post-process a frame.
    #[error("prefetch of frame {frame} failed: {message}")]
    Task { frame: u32, message: String },

    /// A scheduler thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl PrefetchError {
    pub fn task(frame: u32, message: impl Into<String>) -> Self {
        Self::Task {
            frame,
            message: message.into(),
        }
    }
}
