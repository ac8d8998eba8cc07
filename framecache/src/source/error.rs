//! Error types for the reference cache.

use thiserror::Error;

/// Errors raised when a data source is used outside its lifetime.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The handle (or the item behind it) was already released.
    ///
    /// Always a caller lifetime bug.
    #[error("Data source '{identifier}' has already been disposed")]
    Disposed { identifier: String },
}

/// Failure reported by [`DataSource::dispose`](super::DataSource::dispose).
///
/// Disposal runs on cleanup paths, so this error is logged and never
/// propagated to callers of the cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to dispose data source: {message}")]
pub struct DisposeError {
    message: String,
}

impl DisposeError {
    /// Create a new disposal error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
