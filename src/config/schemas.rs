/// Configuration schemas - all config structures defined once with defaults
use crate::config_struct;

// ============================================================================
// API CONFIGURATION
// ============================================================================

config_struct! {
    /// Backend connection settings
    pub struct ApiConfig {
        /// Versioned base URL of the backend API
        base_url: String = "http://127.0.0.1:4242/api/1".to_string(),
        /// Per-request timeout
        timeout_secs: u64 = 30,
    }
}

// ============================================================================
// TASKS CONFIGURATION
// ============================================================================

config_struct! {
    /// Async task monitor settings
    pub struct TasksConfig {
        /// Period of the shared task polling timer
        poll_interval_ms: u64 = 2000,
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

config_struct! {
    /// Keyed item cache settings
    pub struct CacheConfig {
        /// Lower bound of the blockie cache capacity
        blockie_min_size: usize = 200,
        /// Rows per table page; the blockie cache holds three pages worth
        items_per_page: usize = 10,
    }
}

// ============================================================================
// TOKENS CONFIGURATION
// ============================================================================

config_struct! {
    /// Token detection settings
    pub struct TokensConfig {
        /// Maximum detection requests in flight at once
        detection_parallelism: usize = 2,
    }
}

// ============================================================================
// HISTORY CONFIGURATION
// ============================================================================

config_struct! {
    /// History collection settings
    pub struct HistoryConfig {
        /// Page size of the initial collection payload
        default_limit: u32 = 10,
    }
}

// ============================================================================
// ROOT
// ============================================================================

config_struct! {
    /// Root configuration
    pub struct Config {
        api: ApiConfig = ApiConfig::default(),
        tasks: TasksConfig = TasksConfig::default(),
        cache: CacheConfig = CacheConfig::default(),
        tokens: TokensConfig = TokensConfig::default(),
        history: HistoryConfig = HistoryConfig::default(),
    }
}
