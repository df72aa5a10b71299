/// Log tags identifying the subsystem a message comes from
use colored::{ColoredString, Colorize};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Stream,
    Api,
    Feeds,
    Producer,
    Hub,
    Probe,
    Test,
    Other(String),
}

impl LogTag {
    /// Key used by `--debug-<key>` switches
    ///
    /// Hub and probe messages share the producer switch.
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::Stream => "stream".to_string(),
            LogTag::Api => "api".to_string(),
            LogTag::Feeds => "feeds".to_string(),
            LogTag::Producer | LogTag::Hub | LogTag::Probe => "producer".to_string(),
            LogTag::Test => "test".to_string(),
            LogTag::Other(s) => s.to_lowercase(),
        }
    }

    /// Uppercase label used in console and plain output
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::System => "SYSTEM".to_string(),
            LogTag::Config => "CONFIG".to_string(),
            LogTag::Stream => "STREAM".to_string(),
            LogTag::Api => "API".to_string(),
            LogTag::Feeds => "FEEDS".to_string(),
            LogTag::Producer => "PRODUCER".to_string(),
            LogTag::Hub => "HUB".to_string(),
            LogTag::Probe => "PROBE".to_string(),
            LogTag::Test => "TEST".to_string(),
            LogTag::Other(s) => s.to_uppercase(),
        }
    }

    /// Padded, colored label for console output
    pub fn colored(&self, width: usize) -> ColoredString {
        let label = format!("{:<width$}", self.to_plain_string(), width = width);
        match self {
            LogTag::System => label.bright_yellow().bold(),
            LogTag::Config => label.bright_white().bold(),
            LogTag::Stream => label.bright_cyan().bold(),
            LogTag::Api => label.bright_purple().bold(),
            LogTag::Feeds => label.bright_green().bold(),
            LogTag::Producer => label.bright_magenta().bold(),
            LogTag::Hub => label.bright_blue().bold(),
            LogTag::Probe => label.bright_green().bold(),
            LogTag::Test => label.bright_blue().bold(),
            LogTag::Other(_) => label.white().bold(),
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
