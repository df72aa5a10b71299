//! Console formatting
//!
//! `HH:MM:SS [TAG] [LEVEL] message`, colored when enabled. Continuation
//! lines of multi-line messages are indented under the message column.

use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::Colorize;
use std::io::{stdout, ErrorKind, Write};

const TAG_WIDTH: usize = 9;
const LEVEL_WIDTH: usize = 7;

pub fn format_and_log(tag: &LogTag, level: LogLevel, message: &str, colors: bool) {
    let time = Local::now().format("%H:%M:%S").to_string();
    let mut lines = message.split('\n');
    let first = lines.next().unwrap_or_default();

    let prefix = if colors {
        let level_str = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
        let level_str = match level {
            LogLevel::Error => level_str.bright_red().bold(),
            LogLevel::Warning => level_str.bright_yellow().bold(),
            _ => level_str.white().bold(),
        };
        format!("{} [{}] [{}] ", time.dimmed(), tag.colored(TAG_WIDTH), level_str)
    } else {
        format!(
            "{} [{:<tw$}] [{:<lw$}] ",
            time,
            tag.to_plain_string(),
            level.as_str(),
            tw = TAG_WIDTH,
            lw = LEVEL_WIDTH
        )
    };

    print_stdout_safe(&format!("{}{}", prefix, first));

    let indent = " ".repeat(time.len() + TAG_WIDTH + LEVEL_WIDTH + 7);
    for line in lines {
        print_stdout_safe(&format!("{}{}", indent, line));
    }
}

/// Print to stdout, exiting quietly on a broken pipe
fn print_stdout_safe(message: &str) {
    let mut out = stdout().lock();
    if let Err(e) = writeln!(out, "{}", message).and_then(|_| out.flush()) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
}
