//! Budgeted in-memory eviction registry.

use super::r#trait::{Evictable, EvictionRegistry};
use super::types::{ContainerId, EvictionStats, RegenerationCost, Registration};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, info, trace};

/// Registration state for one container.
#[derive(Default)]
struct Entry {
    registration: Option<Registration>,
    lock_count: usize,
}

impl Entry {
    fn size_bytes(&self) -> usize {
        self.registration.as_ref().map(|r| r.size_bytes).unwrap_or(0)
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<ContainerId, Entry>,
    current_bytes: usize,
}

impl Inner {
    /// Drop entries that carry neither a registration nor a lock.
    fn prune(&mut self, id: ContainerId) {
        let empty = self
            .entries
            .get(&id)
            .map(|e| e.registration.is_none() && e.lock_count == 0)
            .unwrap_or(false);
        if empty {
            self.entries.remove(&id);
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    registrations: AtomicU64,
    unregistrations: AtomicU64,
    evictions: AtomicU64,
    bytes_evicted: AtomicU64,
}

/// Eviction candidate picked while holding the registry lock.
struct Victim {
    id: ContainerId,
    size_bytes: usize,
    target: Weak<dyn Evictable>,
}

/// Eviction registry with a byte budget and LRU-by-cost victim selection.
///
/// When the registered bytes exceed the budget,
/// [`evict_if_over_limit`](EvictionRegistry::evict_if_over_limit) unloads
/// unlocked containers, cheapest to regenerate first and least recently used
/// within the same cost, until usage fits again. Unload callbacks run after
/// the registry lock is released, because registrants unregister themselves
/// from inside `unload()`.
///
/// Registration never evicts synchronously; enforcement happens on the
/// caller's schedule or on an [`EvictionDaemon`](super::EvictionDaemon).
pub struct MemoryEvictionRegistry {
    inner: Mutex<Inner>,
    max_bytes: usize,
    counters: Counters,
}

impl MemoryEvictionRegistry {
    /// Create a registry with the given byte budget.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_bytes,
            counters: Counters::default(),
        }
    }

    /// Create a shareable registry.
    pub fn shared(max_bytes: usize) -> Arc<Self> {
        Arc::new(Self::new(max_bytes))
    }

    /// Configured byte budget.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Bytes currently registered.
    pub fn current_bytes(&self) -> usize {
        self.inner.lock().current_bytes
    }

    /// Whether `id` currently holds a registration.
    pub fn is_registered(&self, id: ContainerId) -> bool {
        self.inner
            .lock()
            .entries
            .get(&id)
            .map(|e| e.registration.is_some())
            .unwrap_or(false)
    }

    /// Whether `id` is pinned by at least one lock.
    pub fn is_locked(&self, id: ContainerId) -> bool {
        self.inner
            .lock()
            .entries
            .get(&id)
            .map(|e| e.lock_count > 0)
            .unwrap_or(false)
    }

    /// Pick victims in eviction order until the projected size fits.
    fn select_victims(&self) -> Vec<Victim> {
        let inner = self.inner.lock();
        if inner.current_bytes <= self.max_bytes {
            return Vec::new();
        }

        let mut candidates: Vec<(RegenerationCost, Instant, Victim)> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.lock_count == 0)
            .filter_map(|(id, e)| {
                e.registration.as_ref().map(|r| {
                    (
                        r.cost,
                        r.last_access,
                        Victim {
                            id: *id,
                            size_bytes: r.size_bytes,
                            target: r.target.clone(),
                        },
                    )
                })
            })
            .collect();

        candidates.sort_by_key(|(cost, accessed, _)| (*cost, *accessed));

        let mut projected = inner.current_bytes;
        let mut victims = Vec::new();
        for (_, _, victim) in candidates {
            if projected <= self.max_bytes {
                break;
            }
            projected = projected.saturating_sub(victim.size_bytes);
            victims.push(victim);
        }
        victims
    }

    /// Whether the victim is still registered and unlocked.
    fn still_evictable(&self, id: ContainerId) -> bool {
        self.inner
            .lock()
            .entries
            .get(&id)
            .map(|e| e.registration.is_some() && e.lock_count == 0)
            .unwrap_or(false)
    }
}

impl EvictionRegistry for MemoryEvictionRegistry {
    fn register(&self, id: ContainerId, registration: Registration) {
        let mut inner = self.inner.lock();
        let new_size = registration.size_bytes;
        let entry = inner.entries.entry(id).or_default();
        let old_size = entry.size_bytes();
        entry.registration = Some(registration);
        inner.current_bytes = inner.current_bytes.saturating_sub(old_size) + new_size;
        let current = inner.current_bytes;
        drop(inner);

        self.counters.registrations.fetch_add(1, Ordering::Relaxed);
        trace!(%id, size_bytes = new_size, current_bytes = current, "Container registered");
    }

    fn unregister(&self, id: ContainerId) {
        let mut inner = self.inner.lock();
        let removed = inner
            .entries
            .get_mut(&id)
            .and_then(|e| e.registration.take())
            .map(|r| r.size_bytes);
        if let Some(size) = removed {
            inner.current_bytes = inner.current_bytes.saturating_sub(size);
            inner.prune(id);
            drop(inner);
            self.counters.unregistrations.fetch_add(1, Ordering::Relaxed);
            trace!(%id, size_bytes = size, "Container unregistered");
        }
    }

    fn touch(&self, id: ContainerId, when: Instant) {
        let mut inner = self.inner.lock();
        if let Some(registration) = inner
            .entries
            .get_mut(&id)
            .and_then(|e| e.registration.as_mut())
        {
            if when > registration.last_access {
                registration.last_access = when;
            }
        }
    }

    fn lock(&self, id: ContainerId) {
        let mut inner = self.inner.lock();
        inner.entries.entry(id).or_default().lock_count += 1;
    }

    fn unlock(&self, id: ContainerId) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(&id) {
            entry.lock_count = entry.lock_count.saturating_sub(1);
        }
        inner.prune(id);
    }

    fn evict_if_over_limit(&self) -> usize {
        let victims = self.select_victims();
        if victims.is_empty() {
            return 0;
        }

        let before = self.current_bytes();
        let mut evicted = 0;
        for victim in victims {
            // Unloading one registrant can release others along with it
            if self.current_bytes() <= self.max_bytes {
                break;
            }
            // A registrant may have been locked or unloaded since selection
            if !self.still_evictable(victim.id) {
                continue;
            }
            match victim.target.upgrade() {
                Some(target) => target.unload(),
                None => {
                    debug!(id = %victim.id, "Evicting registration whose owner is gone");
                    self.unregister(victim.id);
                }
            }
            if !self.is_registered(victim.id) {
                evicted += 1;
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .bytes_evicted
                    .fetch_add(victim.size_bytes as u64, Ordering::Relaxed);
            }
        }

        info!(
            evicted,
            before_bytes = before,
            after_bytes = self.current_bytes(),
            max_bytes = self.max_bytes,
            "Frame buffer eviction complete"
        );
        evicted
    }

    fn stats(&self) -> EvictionStats {
        let inner = self.inner.lock();
        EvictionStats {
            registrations: self.counters.registrations.load(Ordering::Relaxed),
            unregistrations: self.counters.unregistrations.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            bytes_evicted: self.counters.bytes_evicted.load(Ordering::Relaxed),
            current_bytes: inner.current_bytes,
            max_bytes: self.max_bytes,
            entries: inner
                .entries
                .values()
                .filter(|e| e.registration.is_some())
                .count(),
            locked: inner.entries.values().filter(|e| e.lock_count > 0).count(),
        }
    }
}

impl std::fmt::Debug for MemoryEvictionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEvictionRegistry")
            .field("max_bytes", &self.max_bytes)
            .field("current_bytes", &self.current_bytes())
            .finish()
    }
}
