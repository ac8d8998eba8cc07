//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.
//! Missing sections and keys keep their defaults; present but malformed
//! values are rejected with [`ConfigFileError::InvalidValue`].

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::LOG_LEVELS;
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;
use crate::prefetch::WindowSize;

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// One INI section plus its name, for error reporting.
struct Section<'a> {
    name: &'static str,
    properties: &'a Properties,
}

impl<'a> Section<'a> {
    fn of(ini: &'a Ini, name: &'static str) -> Option<Self> {
        ini.section(Some(name)).map(|properties| Self { name, properties })
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.properties.get(key).map(str::trim)
    }

    /// Parse a number, optionally requiring it to be at least 1.
    fn number<T: FromStr + PartialOrd + From<u8>>(
        &self,
        key: &str,
        target: &mut T,
        positive: bool,
    ) -> Result<(), ConfigFileError> {
        let Some(raw) = self.get(key) else {
            return Ok(());
        };
        let reason = if positive {
            "must be a positive integer"
        } else {
            "must be a non-negative integer"
        };
        let value: T = raw.parse().map_err(|_| invalid(self.name, key, raw, reason))?;
        if positive && value < T::from(1) {
            return Err(invalid(self.name, key, raw, reason));
        }
        *target = value;
        Ok(())
    }

    fn boolean(&self, key: &str, target: &mut bool) -> Result<(), ConfigFileError> {
        let Some(raw) = self.get(key) else {
            return Ok(());
        };
        *target = match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => true,
            "false" | "no" | "off" | "0" => false,
            _ => return Err(invalid(self.name, key, raw, "must be true or false")),
        };
        Ok(())
    }
}

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = Section::of(ini, "cache") {
        if let Some(v) = section.get("memory_budget") {
            config.cache.memory_budget = parse_size(v).map_err(|_| {
                invalid("cache", "memory_budget", v, "expected format like '2GB', '512MB' or '65536'")
            })?;
        }
        section.number("eviction_interval_secs", &mut config.cache.eviction_interval_secs, true)?;
        section.number("sweep_interval_secs", &mut config.cache.sweep_interval_secs, true)?;
    }

    if let Some(section) = Section::of(ini, "retrieval") {
        let r = &mut config.retrieval;
        section.number("initial_delay_ms", &mut r.initial_delay_ms, true)?;
        section.number("max_delay_ms", &mut r.max_delay_ms, true)?;
        section.number("header_timeout_secs", &mut r.header_timeout_secs, false)?;
        section.number("frame_timeout_secs", &mut r.frame_timeout_secs, false)?;
        section.number("frame_max_attempts", &mut r.frame_max_attempts, true)?;
        if r.max_delay_ms < r.initial_delay_ms {
            return Err(invalid(
                "retrieval",
                "max_delay_ms",
                &r.max_delay_ms.to_string(),
                "must not be smaller than initial_delay_ms",
            ));
        }
    }

    if let Some(section) = Section::of(ini, "prefetch") {
        let p = &mut config.prefetch;
        section.boolean("enabled", &mut p.enabled)?;
        section.number("retrieval_threads", &mut p.retrieval_threads, true)?;
        section.number("post_process_threads", &mut p.post_process_threads, true)?;
        section.number("selected_weight", &mut p.selected_weight, true)?;
        section.number("unselected_weight", &mut p.unselected_weight, true)?;
        section.number("queue_capacity", &mut p.queue_capacity, true)?;
        if let Some(v) = section.get("window") {
            p.window = parse_window(v)
                .ok_or_else(|| invalid("prefetch", "window", v, "must be a number or 'unbounded'"))?;
        }
    }

    if let Some(section) = Section::of(ini, "logging") {
        if let Some(v) = section.get("directory").filter(|v| !v.is_empty()) {
            config.logging.directory = expand_tilde(v);
        }
        if let Some(v) = section.get("file").filter(|v| !v.is_empty()) {
            config.logging.file = v.to_string();
        }
        if let Some(v) = section.get("level") {
            let level = v.to_ascii_lowercase();
            if !LOG_LEVELS.contains(&level.as_str()) {
                return Err(invalid(
                    "logging",
                    "level",
                    v,
                    "must be one of: trace, debug, info, warn, error",
                ));
            }
            config.logging.level = level;
        }
    }

    Ok(config)
}

/// `"unbounded"` or a radius.
fn parse_window(value: &str) -> Option<WindowSize> {
    if value.eq_ignore_ascii_case("unbounded") {
        return Some(WindowSize::Unbounded);
    }
    value.parse().ok().map(WindowSize::Radius)
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
