//! Core types shared by eviction registries and their registrants.

use super::Evictable;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;
use std::time::Instant;

/// Identifier of one registrant (one frame's buffer set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

impl ContainerId {
    /// Allocate a process-unique container identifier.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "container-{}", self.0)
    }
}

/// How expensive a buffer is to regenerate after eviction.
///
/// Cheaper buffers are evicted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum RegenerationCost {
    /// Recomputed from data already in memory.
    Cheap,
    /// Requires decoding or decompression.
    #[default]
    Medium,
    /// Requires a network round trip.
    Expensive,
}

impl fmt::Display for RegenerationCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cheap => write!(f, "cheap"),
            Self::Medium => write!(f, "medium"),
            Self::Expensive => write!(f, "expensive"),
        }
    }
}

/// What a registrant reports when it registers (or re-registers).
#[derive(Clone)]
pub struct Registration {
    /// Bytes currently held by the registrant.
    pub size_bytes: usize,
    /// Last time the registrant's content was accessed.
    pub last_access: Instant,
    /// Regeneration cost hint.
    pub cost: RegenerationCost,
    /// Callback target for unloading.
    pub target: Weak<dyn Evictable>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("size_bytes", &self.size_bytes)
            .field("last_access", &self.last_access)
            .field("cost", &self.cost)
            .field("target_alive", &(self.target.strong_count() > 0))
            .finish()
    }
}

/// Snapshot of eviction registry statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionStats {
    /// Register calls (including re-registrations).
    pub registrations: u64,
    /// Unregister calls that removed a registration.
    pub unregistrations: u64,
    /// Registrants unloaded by the registry.
    pub evictions: u64,
    /// Bytes reclaimed by evictions.
    pub bytes_evicted: u64,
    /// Bytes currently registered.
    pub current_bytes: usize,
    /// Configured budget (0 when unbounded).
    pub max_bytes: usize,
    /// Registrations currently held.
    pub entries: usize,
    /// Registrations currently pinned by a lock.
    pub locked: usize,
}
