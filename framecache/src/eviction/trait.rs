//! Eviction registry trait definitions.

use super::types::{ContainerId, EvictionStats, Registration};
use std::time::Instant;

/// Something the eviction registry can unload to reclaim memory.
pub trait Evictable: Send + Sync {
    /// Drop cached content.
    ///
    /// May be called from any thread at any time. The registrant keeps
    /// working afterwards and regenerates content on its next access.
    /// Registrants that are currently locked may ignore the request.
    fn unload(&self);
}

/// Tracks cached buffers and reclaims memory by unloading them.
///
/// Enables different eviction policies (budgeted LRU, no-op) to be used
/// interchangeably by the frame store.
pub trait EvictionRegistry: Send + Sync {
    /// Register a container, or update an existing registration.
    ///
    /// Lock counts survive re-registration.
    fn register(&self, id: ContainerId, registration: Registration);

    /// Remove a container's registration. Unknown ids are ignored.
    fn unregister(&self, id: ContainerId);

    /// Record an access to a registered container.
    fn touch(&self, id: ContainerId, when: Instant);

    /// Pin a container so it is never unloaded. Locks nest.
    fn lock(&self, id: ContainerId);

    /// Release one lock taken with [`lock`](Self::lock).
    fn unlock(&self, id: ContainerId);

    /// Unload unlocked containers until usage fits the budget.
    ///
    /// Returns the number of containers unloaded. Must not be called while
    /// holding a registrant's own lock.
    fn evict_if_over_limit(&self) -> usize;

    /// Get registry statistics.
    fn stats(&self) -> EvictionStats;
}

/// Registry that accepts registrations and never evicts.
///
/// Useful for:
/// - Tests that exercise the store without memory pressure
/// - Short-lived tools where the working set is known to fit in memory
#[derive(Debug, Clone, Default)]
pub struct NoOpEvictionRegistry;

impl EvictionRegistry for NoOpEvictionRegistry {
    fn register(&self, _id: ContainerId, _registration: Registration) {}

    fn unregister(&self, _id: ContainerId) {}

    fn touch(&self, _id: ContainerId, _when: Instant) {}

    fn lock(&self, _id: ContainerId) {}

    fn unlock(&self, _id: ContainerId) {}

    fn evict_if_over_limit(&self) -> usize {
        0
    }

    fn stats(&self) -> EvictionStats {
        EvictionStats::default()
    }
}
