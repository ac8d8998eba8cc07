//! Data source trait definition.

use super::DisposeError;

/// An expensive-to-construct object providing all data for one instance.
///
/// Implementations are shared between threads through the
/// [`ReferenceCache`](super::ReferenceCache) and are disposed exactly once,
/// after the last [`ReferenceHandle`](super::ReferenceHandle) is released.
pub trait DataSource: Send + Sync + 'static {
    /// Release the resources held by this data source.
    ///
    /// Called once by the cache. Errors are logged by the caller; an
    /// implementation should release whatever it can even when part of the
    /// cleanup fails.
    fn dispose(&self) -> Result<(), DisposeError>;
}
