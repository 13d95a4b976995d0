mod macros;
mod schemas;
mod utils;

pub use schemas::{ApiConfig, CacheConfig, Config, HistoryConfig, TasksConfig, TokensConfig};
pub use utils::{load_config_from_path, parse_config, save_config, CONFIG_FILE_PATH};
