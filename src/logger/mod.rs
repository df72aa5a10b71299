//! Structured logging for kubepulse
//!
//! Tag-based logging with standard levels and per-tag debug switches:
//! - Errors, warnings and info are shown by default
//! - Debug output for a tag requires `--debug-<tag>` (e.g. `--debug-stream`)
//! - Verbose output requires `--verbose`
//! - `--quiet` hides everything below warnings
//!
//! ## Usage
//!
//! ```rust
//! use kubepulse::logger::{self, LogTag};
//!
//! logger::info(LogTag::Stream, "Connected to ws://localhost:3001/ws/metrics");
//! logger::debug(LogTag::Stream, "Dispatching metrics"); // Only with --debug-stream
//! ```
//!
//! Call [`init`] once at startup before any logging occurs.

mod config;
mod core;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, init_from_args, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger from command-line arguments
pub fn init() {
    config::init_from_args();
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level, only shown when `--debug-<tag>` is set
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level, only shown with `--verbose`
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}
