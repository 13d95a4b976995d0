use super::schemas::Config;
/// Configuration utilities - loading and saving
///
/// The loaded `Config` is handed to `Session::new`; nothing reads it through
/// a global.
use crate::errors::{FolioError, FolioResult};
use crate::logger::{self, LogTag};
use std::path::Path;

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/folio.toml";

/// Load configuration from a TOML file
///
/// A missing file is not an error: defaults from the schema definitions are
/// used instead. Missing fields inside an existing file also take defaults.
pub fn load_config_from_path(path: impl AsRef<Path>) -> FolioResult<Config> {
    let path = path.as_ref();

    if !path.exists() {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path.display()),
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        FolioError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
    })?;

    parse_config(&contents)
        .map_err(|e| FolioError::Config(format!("'{}': {}", path.display(), e)))
}

/// Parse configuration from TOML text
pub fn parse_config(contents: &str) -> Result<Config, String> {
    toml::from_str::<Config>(contents).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Write the configuration to disk as pretty TOML
pub fn save_config(config: &Config, path: impl AsRef<Path>) -> FolioResult<()> {
    let path = path.as_ref();
    let config_str = toml::to_string_pretty(config)
        .map_err(|e| FolioError::Config(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FolioError::Config(format!("Failed to create '{}': {}", parent.display(), e))
            })?;
        }
    }

    std::fs::write(path, config_str).map_err(|e| {
        FolioError::Config(format!("Failed to write config file '{}': {}", path.display(), e))
    })
}
