//! User configuration for framecache.
//!
//! Settings are read from `~/.framecache/config.ini`, one INI section per
//! component:
//!
//! - `[cache]`: eviction budget and housekeeping intervals
//! - `[retrieval]`: backoff and retry bounds for headers and frames
//! - `[prefetch]`: scheduler threads, weights and window
//! - `[logging]`: log file location and level
//!
//! Missing files and keys fall back to defaults. Each settings struct converts
//! into the runtime type it configures.
//!
//! # Example
//!
//! ```
//! use framecache::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! let scheduler_config = config.prefetch.scheduler_config();
//! let frame_policy = config.retrieval.frame_policy();
//!
//! assert!(scheduler_config.validate().is_ok());
//! assert_eq!(frame_policy.max_attempts, Some(10));
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{CacheSettings, ConfigFile, LoggingSettings, PrefetchSettings, RetrievalSettings};
pub use size::{format_size, parse_size, SizeParseError};
