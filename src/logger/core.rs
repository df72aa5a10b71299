/// Filtering rules and dispatch to the formatter
use super::config::{get_logger_config, LoggerConfig};
use super::levels::LogLevel;
use super::tags::LogTag;

/// Decide whether a message is shown
///
/// 1. Errors always pass
/// 2. Debug needs the tag's debug switch (and no --quiet)
/// 3. Verbose needs --verbose
/// 4. Everything else is compared against the minimum level
/// 5. A non-empty tag allow-list filters the rest
pub fn should_log(config: &LoggerConfig, tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    let level_ok = match level {
        LogLevel::Debug => config.min_level >= LogLevel::Info && config.is_debug_enabled_for(tag),
        LogLevel::Verbose => config.min_level == LogLevel::Verbose,
        _ => level <= config.min_level,
    };
    if !level_ok {
        return false;
    }

    config.enabled_tags.is_empty() || config.enabled_tags.contains(&tag.to_debug_key())
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    let config = get_logger_config();
    if !should_log(&config, &tag, level) {
        return;
    }
    super::format::format_and_log(&tag, level, message, config.colors);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtering_rules() {
        let mut config = LoggerConfig::default();

        assert!(should_log(&config, &LogTag::Stream, LogLevel::Info));
        assert!(should_log(&config, &LogTag::Stream, LogLevel::Warning));
        assert!(!should_log(&config, &LogTag::Stream, LogLevel::Debug));
        assert!(!should_log(&config, &LogTag::Stream, LogLevel::Verbose));

        config.debug_tags.insert("stream".to_string());
        assert!(should_log(&config, &LogTag::Stream, LogLevel::Debug));
        assert!(!should_log(&config, &LogTag::Feeds, LogLevel::Debug));

        config.debug_tags.insert("producer".to_string());
        assert!(should_log(&config, &LogTag::Hub, LogLevel::Debug));

        config.min_level = LogLevel::Warning;
        assert!(!should_log(&config, &LogTag::Stream, LogLevel::Info));
        assert!(!should_log(&config, &LogTag::Stream, LogLevel::Debug));
        assert!(should_log(&config, &LogTag::Stream, LogLevel::Error));

        config.min_level = LogLevel::Info;
        config.enabled_tags.insert("api".to_string());
        assert!(!should_log(&config, &LogTag::Stream, LogLevel::Info));
        assert!(should_log(&config, &LogTag::Api, LogLevel::Info));
        assert!(should_log(&config, &LogTag::Stream, LogLevel::Error));
    }
}
