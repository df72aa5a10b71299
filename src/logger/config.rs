/// Logger configuration, built from command-line switches at startup
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Highest level shown for untagged filtering (Info by default)
    pub min_level: LogLevel,

    /// Tags with debug output enabled (debug keys, e.g. "stream")
    pub debug_tags: HashSet<String>,

    /// If non-empty, only these tags are shown (errors always pass)
    pub enabled_tags: HashSet<String>,

    /// Colored console output
    pub colors: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            enabled_tags: HashSet::new(),
            colors: true,
        }
    }
}

impl LoggerConfig {
    pub fn is_debug_enabled_for(&self, tag: &LogTag) -> bool {
        self.debug_tags.contains(&tag.to_debug_key())
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

/// Build the logger configuration from `--quiet`, `--verbose` and `--debug-<tag>`
pub fn init_from_args() {
    let mut config = LoggerConfig::default();

    if arguments::is_quiet_enabled() {
        config.min_level = LogLevel::Warning;
    } else if arguments::is_verbose_enabled() {
        config.min_level = LogLevel::Verbose;
    }

    config.debug_tags = arguments::get_enabled_debug_modes().into_iter().collect();
    set_logger_config(config);
}
