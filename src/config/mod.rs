/// Configuration system
///
/// - `macros`: `config_struct!` for sections with embedded defaults
/// - `schemas`: all configuration sections
/// - `utils`: loading, environment overrides and global access
pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::{Config, FeedsConfig, ProducerConfig, StreamConfig};
pub use utils::{
    apply_env_overrides, get_config_clone, load_config, load_config_from_path, parse_config,
    read_config_file, reload_config_from_path, with_config, CONFIG_FILE_PATH,
};
