//! The process-wide registry of data source items.

use super::handle::ReferenceHandle;
use super::item::DataSourceItem;
use super::DataSource;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

/// Lifetime counters for the reference cache.
#[derive(Debug, Default)]
struct ReferenceCacheCounters {
    acquires: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    candidates_discarded: AtomicU64,
    disposals: AtomicU64,
    stale_swept: AtomicU64,
}

/// Snapshot of reference cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceCacheStats {
    /// Total `acquire*` calls.
    pub acquires: u64,
    /// Acquires served by an already-live item.
    pub hits: u64,
    /// Acquires that registered a new item.
    pub misses: u64,
    /// Candidate sources disposed because a live item already existed.
    pub candidates_discarded: u64,
    /// Items disposed after their last handle was released.
    pub disposals: u64,
    /// Registry rows removed by a sweep because the item was gone.
    pub stale_swept: u64,
    /// Rows currently in the registry.
    pub entries: usize,
}

/// State shared between the cache, its items and any sweeper thread.
pub(crate) struct RegistryShared<S: DataSource> {
    entries: Mutex<HashMap<String, Weak<DataSourceItem<S>>>>,
    dirty: AtomicBool,
    counters: ReferenceCacheCounters,
}

impl<S: DataSource> RegistryShared<S> {
    /// Remove `identifier` if its row still points at `item`.
    ///
    /// A newer item may have replaced the row after `item` was disposed; that
    /// row is left alone.
    pub(super) fn remove_item(&self, identifier: &str, item: &DataSourceItem<S>) {
        let mut entries = self.entries.lock();
        let points_at_item = entries
            .get(identifier)
            .map(|weak| std::ptr::eq(weak.as_ptr(), item))
            .unwrap_or(false);
        if points_at_item {
            entries.remove(identifier);
        }
        drop(entries);

        self.counters.disposals.fetch_add(1, Ordering::Relaxed);
        debug!(identifier, removed = points_at_item, "Data source removed from registry");
    }

    pub(super) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

/// Registry of shared, reference-counted data sources keyed by instance
/// identifier.
///
/// At most one live data source exists per identifier. The registry only
/// keeps weak references; the handles keep items alive.
///
/// Cloning the cache is cheap and yields another view of the same registry.
///
/// # Concurrency
///
/// Registry mutations are serialized by a single lock. Reference counts are
/// guarded by a lock per item, so releasing a handle for one instance never
/// contends with work on another.
///
/// # Example
///
/// ```
/// use framecache::source::{DataSource, DisposeError, ReferenceCache};
///
/// struct Study(&'static str);
/// impl DataSource for Study {
///     fn dispose(&self) -> Result<(), DisposeError> {
///         Ok(())
///     }
/// }
///
/// let cache = ReferenceCache::new();
/// let a = cache.acquire_with("1.2.3", || Study("first"));
/// let b = cache.acquire_with("1.2.3", || Study("second"));
///
/// assert!(a.same_source(&b));
/// assert_eq!(b.source().unwrap().0, "first");
///
/// drop(a);
/// drop(b);
/// assert!(!cache.contains("1.2.3"));
/// ```
pub struct ReferenceCache<S: DataSource> {
    shared: Arc<RegistryShared<S>>,
}

impl<S: DataSource> ReferenceCache<S> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                entries: Mutex::new(HashMap::new()),
                dirty: AtomicBool::new(false),
                counters: ReferenceCacheCounters::default(),
            }),
        }
    }

    /// Get a handle for `identifier`, registering `candidate` on a miss.
    ///
    /// If a live item already exists, its count is incremented and the
    /// candidate is disposed so that no duplicate resources stay around.
    pub fn acquire(&self, identifier: impl Into<String>, candidate: S) -> ReferenceHandle<S> {
        let identifier = identifier.into();
        self.shared.counters.acquires.fetch_add(1, Ordering::Relaxed);
        self.sweep_if_dirty();

        let mut entries = self.shared.entries.lock();
        if let Some(handle) = Self::existing_handle(&entries, &identifier) {
            drop(entries);
            self.shared.counters.hits.fetch_add(1, Ordering::Relaxed);
            self.discard_candidate(&identifier, candidate);
            return handle;
        }

        let item = Arc::new(DataSourceItem::new(
            identifier.clone(),
            candidate,
            Arc::downgrade(&self.shared),
        ));
        // A fresh item cannot be disposed yet
        item.add_ref();
        entries.insert(identifier.clone(), Arc::downgrade(&item));
        drop(entries);

        self.shared.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(identifier = %identifier, "Registered new data source");
        ReferenceHandle::new(item)
    }

    /// Get a handle for `identifier`, building the source only on a miss.
    ///
    /// The factory runs outside the registry lock. If another thread
    /// registers the same identifier in the meantime, the freshly built
    /// source loses and is disposed.
    pub fn acquire_with<F>(&self, identifier: impl Into<String>, factory: F) -> ReferenceHandle<S>
    where
        F: FnOnce() -> S,
    {
        match self.try_acquire_with(identifier, || Ok::<_, std::convert::Infallible>(factory())) {
            Ok(handle) => handle,
            Err(never) => match never {},
        }
    }

    /// Fallible variant of [`acquire_with`](Self::acquire_with).
    ///
    /// # Errors
    ///
    /// Returns the factory's error; nothing is registered in that case.
    pub fn try_acquire_with<F, E>(
        &self,
        identifier: impl Into<String>,
        factory: F,
    ) -> Result<ReferenceHandle<S>, E>
    where
        F: FnOnce() -> Result<S, E>,
    {
        let identifier = identifier.into();

        {
            let entries = self.shared.entries.lock();
            if let Some(handle) = Self::existing_handle(&entries, &identifier) {
                drop(entries);
                self.shared.counters.acquires.fetch_add(1, Ordering::Relaxed);
                self.shared.counters.hits.fetch_add(1, Ordering::Relaxed);
                trace!(identifier = %identifier, "Data source cache hit");
                return Ok(handle);
            }
        }

        let candidate = factory()?;
        Ok(self.acquire(identifier, candidate))
    }

    fn existing_handle(
        entries: &HashMap<String, Weak<DataSourceItem<S>>>,
        identifier: &str,
    ) -> Option<ReferenceHandle<S>> {
        let item = entries.get(identifier)?.upgrade()?;
        if item.add_ref() {
            Some(ReferenceHandle::new(item))
        } else {
            None
        }
    }

    fn discard_candidate(&self, identifier: &str, candidate: S) {
        self.shared
            .counters
            .candidates_discarded
            .fetch_add(1, Ordering::Relaxed);
        trace!(identifier, "Discarding duplicate data source candidate");
        if let Err(e) = candidate.dispose() {
            warn!(identifier, error = %e, "Failed to dispose discarded data source candidate");
        }
    }

    /// Whether a live (not disposed) source is registered for `identifier`.
    pub fn contains(&self, identifier: &str) -> bool {
        let entries = self.shared.entries.lock();
        entries
            .get(identifier)
            .and_then(Weak::upgrade)
            .map(|item| !item.is_disposed())
            .unwrap_or(false)
    }

    /// Number of rows in the registry, including stale rows not yet swept.
    pub fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    /// Whether the registry has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove rows whose item is gone or already disposed.
    ///
    /// Rows whose item no longer exists were never removed by a release and
    /// are logged as a warning. Returns the number of rows removed.
    pub fn sweep(&self) -> usize {
        let mut dead = Vec::new();
        let mut removed = 0;
        {
            let mut entries = self.shared.entries.lock();
            entries.retain(|identifier, weak| match weak.upgrade() {
                Some(item) if !item.is_disposed() => true,
                Some(_) => {
                    removed += 1;
                    false
                }
                None => {
                    dead.push(identifier.clone());
                    removed += 1;
                    false
                }
            });
        }

        for identifier in &dead {
            warn!(identifier = %identifier, "Swept stale data source entry that was never released");
        }
        if removed > 0 {
            self.shared
                .counters
                .stale_swept
                .fetch_add(dead.len() as u64, Ordering::Relaxed);
            debug!(removed, stale = dead.len(), "Reference cache sweep complete");
        }
        removed
    }

    fn sweep_if_dirty(&self) {
        if self.shared.dirty.swap(false, Ordering::AcqRel) {
            self.sweep();
        }
    }

    /// Get a snapshot of cache statistics.
    pub fn stats(&self) -> ReferenceCacheStats {
        let c = &self.shared.counters;
        ReferenceCacheStats {
            acquires: c.acquires.load(Ordering::Relaxed),
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            candidates_discarded: c.candidates_discarded.load(Ordering::Relaxed),
            disposals: c.disposals.load(Ordering::Relaxed),
            stale_swept: c.stale_swept.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl<S: DataSource> Default for ReferenceCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DataSource> Clone for ReferenceCache<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: DataSource> std::fmt::Debug for ReferenceCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
impl<S: DataSource> ReferenceCache<S> {
    /// Insert a row whose item is already gone.
    fn insert_dead_row(&self, identifier: &str) {
        self.shared
            .entries
            .lock()
            .insert(identifier.to_string(), Weak::new());
        self.shared.mark_dirty();
    }
}
