//! Prefetch statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for the prefetch scheduler.
#[derive(Debug, Default)]
pub struct PrefetchStats {
    /// Scheduling rounds run by the coordinator.
    pub rounds: AtomicU64,
    /// Entries handed to the retrieval pool.
    pub dispatched: AtomicU64,
    /// Entries skipped because their viewport moved on.
    pub stale_skipped: AtomicU64,
    /// Frames dropped by the eligibility predicate.
    pub ineligible_dropped: AtomicU64,
    /// Successful retrievals.
    pub retrievals_completed: AtomicU64,
    /// Failed retrievals.
    pub retrievals_failed: AtomicU64,
    /// Successful post-processing runs.
    pub post_process_completed: AtomicU64,
    /// Failed post-processing runs.
    pub post_process_failed: AtomicU64,
    /// Retrieved frames the post-process condition declined.
    pub post_process_skipped: AtomicU64,
}

impl PrefetchStats {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> PrefetchStatsSnapshot {
        PrefetchStatsSnapshot {
            rounds: self.rounds.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            stale_skipped: self.stale_skipped.load(Ordering::Relaxed),
            ineligible_dropped: self.ineligible_dropped.load(Ordering::Relaxed),
            retrievals_completed: self.retrievals_completed.load(Ordering::Relaxed),
            retrievals_failed: self.retrievals_failed.load(Ordering::Relaxed),
            post_process_completed: self.post_process_completed.load(Ordering::Relaxed),
            post_process_failed: self.post_process_failed.load(Ordering::Relaxed),
            post_process_skipped: self.post_process_skipped.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// Snapshot of prefetch statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchStatsSnapshot {
    pub rounds: u64,
    pub dispatched: u64,
    pub stale_skipped: u64,
    pub ineligible_dropped: u64,
    pub retrievals_completed: u64,
    pub retrievals_failed: u64,
    pub post_process_completed: u64,
    pub post_process_failed: u64,
    pub post_process_skipped: u64,
}
