//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file and knows
//! how to turn itself into the runtime type it configures.

use super::defaults::*;
use crate::prefetch::{SchedulerConfig, WindowSize};
use crate::retrieval::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub retrieval: RetrievalSettings,
    pub prefetch: PrefetchSettings,
    pub logging: LoggingSettings,
}

/// `[cache]`: eviction budget and housekeeping intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Eviction registry budget in bytes.
    pub memory_budget: usize,
    /// Seconds between eviction daemon runs.
    pub eviction_interval_secs: u64,
    /// Seconds between reference cache sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory_budget: DEFAULT_MEMORY_BUDGET,
            eviction_interval_secs: DEFAULT_EVICTION_INTERVAL_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl CacheSettings {
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// `[retrieval]`: backoff and the independent header/frame bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalSettings {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub header_timeout_secs: u64,
    pub frame_timeout_secs: u64,
    pub frame_max_attempts: u32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            header_timeout_secs: DEFAULT_HEADER_TIMEOUT_SECS,
            frame_timeout_secs: DEFAULT_FRAME_TIMEOUT_SECS,
            frame_max_attempts: DEFAULT_FRAME_MAX_ATTEMPTS_SETTING,
        }
    }
}

impl RetrievalSettings {
    /// Retry policy for header retrieval (time-bounded only).
    pub fn header_policy(&self) -> RetryPolicy {
        RetryPolicy::header_default()
            .with_delays(
                Duration::from_millis(self.initial_delay_ms),
                Duration::from_millis(self.max_delay_ms),
            )
            .with_timeout(Duration::from_secs(self.header_timeout_secs))
    }

    /// Retry policy for frame retrieval (time- and attempt-bounded).
    pub fn frame_policy(&self) -> RetryPolicy {
        RetryPolicy::frame_default()
            .with_delays(
                Duration::from_millis(self.initial_delay_ms),
                Duration::from_millis(self.max_delay_ms),
            )
            .with_timeout(Duration::from_secs(self.frame_timeout_secs))
            .with_max_attempts(Some(self.frame_max_attempts))
    }
}

/// `[prefetch]`: scheduler threads, weights and window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchSettings {
    pub enabled: bool,
    pub retrieval_threads: usize,
    pub post_process_threads: usize,
    pub selected_weight: usize,
    pub unselected_weight: usize,
    pub window: WindowSize,
    pub queue_capacity: usize,
}

impl Default for PrefetchSettings {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_PREFETCH_ENABLED,
            retrieval_threads: DEFAULT_PREFETCH_RETRIEVAL_THREADS,
            post_process_threads: DEFAULT_PREFETCH_POST_PROCESS_THREADS,
            selected_weight: DEFAULT_PREFETCH_SELECTED_WEIGHT,
            unselected_weight: DEFAULT_PREFETCH_UNSELECTED_WEIGHT,
            window: WindowSize::Radius(DEFAULT_PREFETCH_WINDOW),
            queue_capacity: DEFAULT_PREFETCH_QUEUE_CAPACITY,
        }
    }
}

impl PrefetchSettings {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            retrieval_threads: self.retrieval_threads,
            post_process_threads: self.post_process_threads,
            selected_weight: self.selected_weight,
            unselected_weight: self.unselected_weight,
            window: self.window,
            queue_capacity: self.queue_capacity,
        }
    }
}

/// `[logging]`: log file location and default level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log directory. Relative paths resolve against the config directory.
    pub directory: PathBuf,
    pub file: String,
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_LOG_DIRECTORY),
            file: DEFAULT_LOG_FILE.to_string(),
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl LoggingSettings {
    /// Log directory with relative paths resolved against `base`.
    pub fn resolved_directory(&self, base: &std::path::Path) -> PathBuf {
        if self.directory.is_absolute() {
            self.directory.clone()
        } else {
            base.join(&self.directory)
        }
    }
}
