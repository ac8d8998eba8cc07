//! Reference-counted wrapper around one data source.

use super::registry::RegistryShared;
use super::DataSource;
use parking_lot::Mutex;
use std::sync::Weak;
use tracing::{debug, warn};

/// Mutable part of an item, guarded by the item's own lock.
#[derive(Debug, Default)]
struct ItemState {
    ref_count: usize,
    disposed: bool,
}

/// A data source registered in the [`ReferenceCache`](super::ReferenceCache).
///
/// The item carries the reference count of outstanding handles and a
/// `disposed` flag. Once the count drops to zero the source is disposed and
/// the item is never reused; the registry creates a fresh item if the same
/// identifier is requested again.
pub struct DataSourceItem<S: DataSource> {
    identifier: String,
    source: S,
    state: Mutex<ItemState>,
    registry: Weak<RegistryShared<S>>,
}

impl<S: DataSource> DataSourceItem<S> {
    pub(super) fn new(identifier: String, source: S, registry: Weak<RegistryShared<S>>) -> Self {
        Self {
            identifier,
            source,
            state: Mutex::new(ItemState::default()),
            registry,
        }
    }

    /// Instance identifier this item was registered under.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Number of outstanding handles.
    pub fn ref_count(&self) -> usize {
        self.state.lock().ref_count
    }

    /// Whether the underlying source has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    pub(super) fn source(&self) -> &S {
        &self.source
    }

    /// Increment the reference count.
    ///
    /// Returns `false` if the item is already disposed, in which case the
    /// count is left untouched and the caller must not hand out a handle.
    pub(super) fn add_ref(&self) -> bool {
        let mut state = self.state.lock();
        if state.disposed {
            return false;
        }
        state.ref_count += 1;
        true
    }

    /// Decrement the reference count, disposing the source at zero.
    pub(super) fn release(&self) {
        let reached_zero = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.ref_count = state.ref_count.saturating_sub(1);
            if state.ref_count == 0 {
                state.disposed = true;
                true
            } else {
                false
            }
        };

        if reached_zero {
            debug!(identifier = %self.identifier, "Last reference released, disposing data source");
            self.dispose_source();
            if let Some(registry) = self.registry.upgrade() {
                registry.remove_item(&self.identifier, self);
            }
        }
    }

    fn dispose_source(&self) {
        if let Err(e) = self.source.dispose() {
            warn!(
                identifier = %self.identifier,
                error = %e,
                "Data source disposal failed"
            );
        }
    }
}

// Handles always release before their item drops; this only fires for items
// dropped without ever being handed out.
impl<S: DataSource> Drop for DataSourceItem<S> {
    fn drop(&mut self) {
        let already_disposed = std::mem::replace(&mut self.state.get_mut().disposed, true);
        if already_disposed {
            return;
        }

        warn!(
            identifier = %self.identifier,
            ref_count = self.state.get_mut().ref_count,
            "Data source item dropped without being released"
        );
        self.dispose_source();
        if let Some(registry) = self.registry.upgrade() {
            registry.mark_dirty();
        }
    }
}

impl<S: DataSource> std::fmt::Debug for DataSourceItem<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DataSourceItem")
            .field("identifier", &self.identifier)
            .field("ref_count", &state.ref_count)
            .field("disposed", &state.disposed)
            .finish()
    }
}

/// Helper for tests that need an item outside of a registry.
#[cfg(test)]
pub(super) fn detached<S: DataSource>(
    identifier: &str,
    source: S,
) -> std::sync::Arc<DataSourceItem<S>> {
    std::sync::Arc::new(DataSourceItem::new(identifier.to_string(), source, Weak::new()))
}
