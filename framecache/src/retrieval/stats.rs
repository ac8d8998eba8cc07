//! Retrieval statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live retrieval counters.
#[derive(Debug, Default)]
pub struct RetrievalStats {
    /// Transport calls made.
    pub attempts: AtomicU64,
    /// Transport calls that were retries of a failed call.
    pub retries: AtomicU64,
    /// Retrievals that gave up.
    pub failures: AtomicU64,
    /// Calls answered from a memoized failure.
    pub memoized_failures: AtomicU64,
    /// Calls answered from an earlier success.
    pub cache_hits: AtomicU64,
    /// Payload bytes received.
    pub bytes_retrieved: AtomicU64,
}

impl RetrievalStats {
    pub fn snapshot(&self) -> RetrievalStatsSnapshot {
        RetrievalStatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            memoized_failures: self.memoized_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            bytes_retrieved: self.bytes_retrieved.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of retrieval statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalStatsSnapshot {
    pub attempts: u64,
    pub retries: u64,
    pub failures: u64,
    pub memoized_failures: u64,
    pub cache_hits: u64,
    pub bytes_retrieved: u64,
}

impl RetrievalStatsSnapshot {
    /// Sum two snapshots, e.g. across instances.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            attempts: self.attempts + other.attempts,
            retries: self.retries + other.retries,
            failures: self.failures + other.failures,
            memoized_failures: self.memoized_failures + other.memoized_failures,
            cache_hits: self.cache_hits + other.cache_hits,
            bytes_retrieved: self.bytes_retrieved + other.bytes_retrieved,
        }
    }
}
