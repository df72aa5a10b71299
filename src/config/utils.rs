/// Configuration loading and access helpers
///
/// - Loading configuration from a TOML file (defaults when absent)
/// - Environment overrides (API URL, demo mode)
/// - Global read access for the binary
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::path::Path;

use super::schemas::Config;
use crate::arguments;
use crate::errors::ConfigError;
use crate::logger::{self, LogTag};

/// Global configuration instance, set once by the binary
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

/// Parse a configuration document
pub fn parse_config(contents: &str, origin: &str) -> Result<Config, ConfigError> {
    toml::from_str::<Config>(contents).map_err(|source| ConfigError::Parse {
        path: origin.to_string(),
        source,
    })
}

/// Read a configuration file, falling back to defaults if it does not exist
pub fn read_config_file(path: &str) -> Result<Config, ConfigError> {
    if !Path::new(path).exists() {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path),
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    parse_config(&contents, path)
}

/// Apply environment overrides on top of file values
///
/// `KUBEPULSE_API_URL` replaces the stream API URL and
/// `KUBEPULSE_DEMO_MODE=true` (or `--demo`) turns demo mode on.
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(url) = arguments::api_url_from_env() {
        logger::debug(LogTag::Config, &format!("API URL overridden from environment: {}", url));
        config.stream.api_url = url;
    }
    if arguments::is_demo_mode_enabled() {
        config.feeds.demo_mode = true;
    }
}

/// Load configuration (file + environment) into the global CONFIG
pub fn load_config_from_path(path: &str) -> Result<(), ConfigError> {
    let mut config = read_config_file(path)?;
    apply_env_overrides(&mut config);

    CONFIG
        .set(RwLock::new(config))
        .map_err(|_| ConfigError::AlreadyInitialized)
}

/// Load configuration from the default path
pub fn load_config() -> Result<(), ConfigError> {
    load_config_from_path(CONFIG_FILE_PATH)
}

/// Replace the global configuration by re-reading a file
pub fn reload_config_from_path(path: &str) -> Result<(), ConfigError> {
    let mut new_config = read_config_file(path)?;
    apply_env_overrides(&mut new_config);

    let lock = CONFIG.get().ok_or(ConfigError::NotInitialized)?;
    *lock.write() = new_config;
    Ok(())
}

/// Run a closure with read access to the global configuration
///
/// Falls back to defaults when the configuration was never loaded, so
/// library code stays usable in tests and embedding applications.
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    match CONFIG.get() {
        Some(lock) => f(&lock.read()),
        None => f(&Config::default()),
    }
}

/// Clone of the current configuration
pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}
