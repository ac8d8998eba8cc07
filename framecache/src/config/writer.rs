//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;
use crate::prefetch::WindowSize;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let window = match config.prefetch.window {
        WindowSize::Radius(radius) => radius.to_string(),
        WindowSize::Unbounded => "unbounded".to_string(),
    };

    format!(
        r#"[cache]
; Memory budget for decoded frame buffers (default: 2GB)
; Supports: KB, MB, GB suffixes (e.g., 512MB, 2GB, 4GB)
memory_budget = {}
; Seconds between eviction passes over the budget (default: 5)
eviction_interval_secs = {}
; Seconds between sweeps of dead reference cache entries (default: 30)
sweep_interval_secs = {}

[retrieval]
; Backoff between failed attempts starts at initial_delay_ms and doubles
; up to max_delay_ms (defaults: 50 and 1000)
initial_delay_ms = {}
max_delay_ms = {}
; Headers are retried until this many seconds have elapsed (default: 30)
header_timeout_secs = {}
; Frames are retried until either bound is reached (defaults: 30 and 10)
frame_timeout_secs = {}
frame_max_attempts = {}

[prefetch]
; Background retrieval of frames around the current position
enabled = {}
; Worker threads for retrieval and post-processing (defaults: 4 and 2)
retrieval_threads = {}
post_process_threads = {}
; Frames dispatched per round for the selected viewport and for each
; other viewport (defaults: 3 and 2)
selected_weight = {}
unselected_weight = {}
; Frames on each side of the current frame, or "unbounded" (default: 20)
window = {}
; Jobs that may wait for a free worker (default: 64)
queue_capacity = {}

[logging]
; Log directory, relative to ~/.framecache unless absolute
directory = {}
file = {}
; One of: trace, debug, info, warn, error (RUST_LOG overrides)
level = {}
"#,
        format_size(config.cache.memory_budget),
        config.cache.eviction_interval_secs,
        config.cache.sweep_interval_secs,
        config.retrieval.initial_delay_ms,
        config.retrieval.max_delay_ms,
        config.retrieval.header_timeout_secs,
        config.retrieval.frame_timeout_secs,
        config.retrieval.frame_max_attempts,
        config.prefetch.enabled,
        config.prefetch.retrieval_threads,
        config.prefetch.post_process_threads,
        config.prefetch.selected_weight,
        config.prefetch.unselected_weight,
        window,
        config.prefetch.queue_capacity,
        path_to_string(&config.logging.directory),
        config.logging.file,
        config.logging.level,
    )
}

/// Render a path, collapsing the home directory to `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
