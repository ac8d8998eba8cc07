//! Prefetch scheduler configuration.

use super::{PrefetchError, WindowSize};

/// Default number of retrieval worker threads.
pub const DEFAULT_RETRIEVAL_THREADS: usize = 4;

/// Default number of post-processing worker threads.
pub const DEFAULT_POST_PROCESS_THREADS: usize = 2;

/// Default entries taken from the selected viewport per round.
pub const DEFAULT_SELECTED_WEIGHT: usize = 3;

/// Default entries taken from each other viewport per round.
pub const DEFAULT_UNSELECTED_WEIGHT: usize = 2;

/// Default bound on queued jobs per worker pool.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Configuration for the prefetch scheduler.
///
/// Fixed once the scheduler has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Threads retrieving raw frame data.
    pub retrieval_threads: usize,
    /// Threads post-processing retrieved frames.
    pub post_process_threads: usize,
    /// Entries taken from the selected viewport per round.
    pub selected_weight: usize,
    /// Entries taken from every other viewport per round.
    pub unselected_weight: usize,
    /// Prefetch window around each viewport's current frame.
    pub window: WindowSize,
    /// Maximum queued jobs per worker pool before dispatch blocks.
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retrieval_threads: DEFAULT_RETRIEVAL_THREADS,
            post_process_threads: DEFAULT_POST_PROCESS_THREADS,
            selected_weight: DEFAULT_SELECTED_WEIGHT,
            unselected_weight: DEFAULT_UNSELECTED_WEIGHT,
            window: WindowSize::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl SchedulerConfig {
    /// Reject zero thread counts, weights and capacities.
    pub fn validate(&self) -> Result<(), PrefetchError> {
        let checks = [
            ("retrieval_threads", self.retrieval_threads),
            ("post_process_threads", self.post_process_threads),
            ("selected_weight", self.selected_weight),
            ("unselected_weight", self.unselected_weight),
            ("queue_capacity", self.queue_capacity),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(PrefetchError::InvalidConfig {
                    field,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}
