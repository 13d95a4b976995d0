//! Structured logging for folio
//!
//! This module provides a small tag-based logging API with:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-tag debug control via `--debug <tag>`
//! - Dual output: colored console + optional file persistence
//!
//! ## Usage
//!
//! ```rust
//! use folio::logger::{self, LogTag};
//!
//! logger::error(LogTag::Api, "Connection failed");
//! logger::warning(LogTag::Tasks, "Task 12 not found on backend");
//! logger::info(LogTag::Transactions, "Refresh finished");
//! logger::debug(LogTag::Cache, "Batch of 3 keys"); // Only with --debug cache
//! logger::verbose(LogTag::Api, "Raw body: ..."); // Only with --verbose
//! ```
//!
//! ## Initialization
//!
//! Call once at startup with the config assembled from CLI flags:
//! ```rust
//! folio::logger::init(folio::logger::LoggerConfig::default());
//! ```
//! Logging before `init` uses the default configuration (console only).

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system
///
/// Stores the configuration and opens the log file if one is configured.
pub fn init(config: LoggerConfig) {
    let file_path = config.file_path.clone();
    set_logger_config(config);

    if let Some(path) = file_path {
        file::init_file_logging(&path);
    }
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level
///
/// Only shown when debug is enabled for the tag (`--debug <tag>`).
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level
///
/// Only shown with `--verbose`.
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Force flush pending file writes
///
/// Call during shutdown to make sure everything reached the disk.
pub fn flush() {
    file::flush_file_logging();
}
