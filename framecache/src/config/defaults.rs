//! Default configuration values.

use crate::prefetch::{
    DEFAULT_POST_PROCESS_THREADS, DEFAULT_QUEUE_CAPACITY, DEFAULT_RETRIEVAL_THREADS,
    DEFAULT_SELECTED_WEIGHT, DEFAULT_UNSELECTED_WEIGHT,
};
use crate::retrieval::{DEFAULT_FRAME_MAX_ATTEMPTS, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY, DEFAULT_TIMEOUT};

/// Eviction registry budget (2GB).
pub const DEFAULT_MEMORY_BUDGET: usize = 2 * 1024 * 1024 * 1024;

/// Seconds between eviction daemon runs.
pub const DEFAULT_EVICTION_INTERVAL_SECS: u64 = 5;

/// Seconds between reference cache sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

pub const DEFAULT_INITIAL_DELAY_MS: u64 = DEFAULT_INITIAL_DELAY.as_millis() as u64;
pub const DEFAULT_MAX_DELAY_MS: u64 = DEFAULT_MAX_DELAY.as_millis() as u64;
pub const DEFAULT_HEADER_TIMEOUT_SECS: u64 = DEFAULT_TIMEOUT.as_secs();
pub const DEFAULT_FRAME_TIMEOUT_SECS: u64 = DEFAULT_TIMEOUT.as_secs();
pub const DEFAULT_FRAME_MAX_ATTEMPTS_SETTING: u32 = DEFAULT_FRAME_MAX_ATTEMPTS;

pub const DEFAULT_PREFETCH_ENABLED: bool = true;
pub const DEFAULT_PREFETCH_RETRIEVAL_THREADS: usize = DEFAULT_RETRIEVAL_THREADS;
pub const DEFAULT_PREFETCH_POST_PROCESS_THREADS: usize = DEFAULT_POST_PROCESS_THREADS;
pub const DEFAULT_PREFETCH_SELECTED_WEIGHT: usize = DEFAULT_SELECTED_WEIGHT;
pub const DEFAULT_PREFETCH_UNSELECTED_WEIGHT: usize = DEFAULT_UNSELECTED_WEIGHT;
pub const DEFAULT_PREFETCH_WINDOW: u32 = 20;
pub const DEFAULT_PREFETCH_QUEUE_CAPACITY: usize = DEFAULT_QUEUE_CAPACITY;

/// Log directory, relative to the config directory unless absolute.
pub const DEFAULT_LOG_DIRECTORY: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "framecache.log";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Accepted values for `[logging] level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
