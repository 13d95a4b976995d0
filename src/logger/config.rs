/// Logger configuration, held in a process-wide slot so that free logging
/// functions can be called from anywhere.
use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Messages above this level are dropped (Error is never dropped)
    pub min_level: LogLevel,
    /// Tags (debug keys) with DEBUG output enabled
    pub debug_tags: HashSet<String>,
    /// Optional file sink, appended to
    pub file_path: Option<PathBuf>,
    /// Disable ANSI colors on the console
    pub plain: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            file_path: None,
            plain: false,
        }
    }
}

impl LoggerConfig {
    /// Build from CLI flags: `--debug <tag>` (repeatable, `all` for every tag)
    /// and `--verbose`
    pub fn from_flags(debug_tags: &[String], verbose: bool) -> Self {
        let debug_tags: HashSet<String> = debug_tags.iter().map(|t| t.to_lowercase()).collect();
        let min_level = if verbose {
            LogLevel::Verbose
        } else if !debug_tags.is_empty() {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };

        Self {
            min_level,
            debug_tags,
            ..Default::default()
        }
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

pub(super) fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let config = LOGGER_CONFIG.read();
    config.min_level >= LogLevel::Debug
        && (config.debug_tags.contains("all") || config.debug_tags.contains(&tag.to_debug_key()))
}
