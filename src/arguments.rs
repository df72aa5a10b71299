/// Centralized argument handling for kubepulse
///
/// The binary parses its subcommands with clap, but debug switches are read
/// from anywhere in the process through this module so that the logger and
/// library code do not need a handle to the parsed matches.
///
/// Features:
/// - Centralized CMD_ARGS storage with thread-safe access
/// - Debug flag checking functions per log tag
/// - Environment overrides for the API URL and demo mode
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

use crate::constants::{API_URL_ENV, DEMO_MODE_ENV};

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Known `--debug-<tag>` switches
pub const DEBUG_FLAGS: &[&str] = &[
    "--debug-stream",
    "--debug-producer",
    "--debug-feeds",
    "--debug-api",
    "--debug-config",
    "--debug-system",
];

/// Sets the global command-line arguments
/// Used by tests to override the default env::args() collection
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value of a command-line argument that follows a flag
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

// =============================================================================
// DEBUG FLAGS
// =============================================================================

/// Streaming client debug mode
pub fn is_debug_stream_enabled() -> bool {
    has_arg("--debug-stream")
}

/// Producer (hub, probes, sources) debug mode
pub fn is_debug_producer_enabled() -> bool {
    has_arg("--debug-producer")
}

/// Feed adapters debug mode
pub fn is_debug_feeds_enabled() -> bool {
    has_arg("--debug-feeds")
}

pub fn is_verbose_enabled() -> bool {
    has_arg("--verbose") || has_arg("-v")
}

pub fn is_quiet_enabled() -> bool {
    has_arg("--quiet") || has_arg("-q")
}

/// Names of all enabled debug switches, without the `--debug-` prefix
pub fn get_enabled_debug_modes() -> Vec<String> {
    get_cmd_args()
        .iter()
        .filter_map(|a| a.strip_prefix("--debug-"))
        .map(|s| s.to_string())
        .collect()
}

/// Prints debug information about current arguments and enabled debug modes
pub fn print_debug_info() {
    let modes = get_enabled_debug_modes();
    if !modes.is_empty() {
        println!("Enabled debug modes: {:?}", modes);
    }
}

// =============================================================================
// ENVIRONMENT
// =============================================================================

/// API base URL from the environment, if set and non-empty
pub fn api_url_from_env() -> Option<String> {
    env::var(API_URL_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Demo mode from `--demo` or the environment flag
pub fn is_demo_mode_enabled() -> bool {
    has_arg("--demo")
        || env::var(DEMO_MODE_ENV)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test: CMD_ARGS is process-global and tests run in parallel.
    #[test]
    fn test_argument_helpers() {
        set_cmd_args(vec![
            "kubepulse".to_string(),
            "watch".to_string(),
            "--debug-stream".to_string(),
            "--debug-feeds".to_string(),
            "--api-url".to_string(),
            "http://cluster:3001".to_string(),
        ]);

        assert!(has_arg("--debug-stream"));
        assert!(is_debug_stream_enabled());
        assert!(is_debug_feeds_enabled());
        assert!(!is_debug_producer_enabled());
        assert_eq!(
            get_arg_value("--api-url"),
            Some("http://cluster:3001".to_string())
        );
        assert_eq!(get_arg_value("--topic"), None);

        let modes = get_enabled_debug_modes();
        assert_eq!(modes, vec!["stream".to_string(), "feeds".to_string()]);

        set_cmd_args(vec!["kubepulse".to_string(), "--api-url".to_string()]);
        assert_eq!(get_arg_value("--api-url"), None);
    }
}
