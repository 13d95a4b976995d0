//! Log formatting and output with ANSI colors
//!
//! Console lines are `HH:MM:SS [TAG] [LEVEL] message`; file lines carry the
//! full date and no color codes. Long messages are wrapped at word boundaries
//! and continuation lines are indented under the message column.

use super::config::get_logger_config;
use super::file::write_to_file;
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 7;

/// Maximum message width before wrapping
const MAX_MESSAGE_WIDTH: usize = 110;

pub fn format_and_log(tag: &LogTag, level: LogLevel, message: &str) {
    let now = Local::now();
    let plain = get_logger_config().plain;

    let time = now.format("%H:%M:%S").to_string();
    let tag_label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    let level_label = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);

    let base_line = if plain {
        format!("{} [{}] [{}] ", time, tag_label, level_label)
    } else {
        format!(
            "{} [{}] [{}] ",
            time.dimmed(),
            color_tag(tag, &tag_label),
            color_level(level, &level_label)
        )
    };

    let indent = " ".repeat(time.len() + TAG_WIDTH + LEVEL_WIDTH + 7);
    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();

    for (i, chunk) in wrap_text(message, MAX_MESSAGE_WIDTH).iter().enumerate() {
        if i == 0 {
            print_stdout_safe(&format!("{}{}", base_line, chunk));
        } else {
            print_stdout_safe(&format!("{}{}", indent, chunk));
        }
        write_to_file(&format!(
            "{} [{}] [{}] {}",
            timestamp,
            tag.to_plain_string(),
            level.as_str(),
            chunk
        ));
    }
}

fn color_tag(tag: &LogTag, label: &str) -> ColoredString {
    match tag {
        LogTag::Api => label.bright_purple().bold(),
        LogTag::Tasks => label.bright_yellow().bold(),
        LogTag::Cache => label.bright_cyan().bold(),
        LogTag::Status => label.bright_white().bold(),
        LogTag::Transactions => label.bright_blue().bold(),
        LogTag::LedgerActions => label.bright_blue().bold(),
        LogTag::Defi => label.bright_green().bold(),
        LogTag::Tokens => label.bright_cyan().bold(),
        LogTag::Accounts => label.bright_magenta().bold(),
        LogTag::Notifications => label.bright_red().bold(),
        LogTag::Config => label.bright_white().bold(),
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Test => label.bright_blue().bold(),
        LogTag::Other(_) => label.white().bold(),
    }
}

fn color_level(level: LogLevel, label: &str) -> ColoredString {
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.bright_yellow().bold(),
        LogLevel::Info => label.white().bold(),
        LogLevel::Debug | LogLevel::Verbose => label.dimmed(),
    }
}

/// Print to stdout but ignore broken pipe errors
fn print_stdout_safe(message: &str) {
    let mut out = stdout();
    if let Err(e) = writeln!(out, "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            return;
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
    let _ = out.flush();
}

/// Wrap text at word boundaries, respecting existing newlines
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for line in text.split('\n') {
        if line.chars().count() <= max_width {
            result.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        for word in line.split_whitespace() {
            let current_len = current.chars().count();
            let word_len = word.chars().count();

            if current.is_empty() {
                current = word.to_string();
            } else if current_len + word_len + 1 <= max_width {
                current.push(' ');
                current.push_str(word);
            } else {
                result.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }

    if result.is_empty() {
        result.push(String::new());
    }
    result
}
