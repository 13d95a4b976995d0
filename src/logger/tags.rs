/// Log tags, one per subsystem
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    Api,
    Tasks,
    Cache,
    Status,
    Transactions,
    LedgerActions,
    Defi,
    Tokens,
    Accounts,
    Notifications,
    Config,
    System,
    Test,
    Other(String),
}

impl LogTag {
    /// Key used by `--debug <key>`
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::Api => "api".to_string(),
            LogTag::Tasks => "tasks".to_string(),
            LogTag::Cache => "cache".to_string(),
            LogTag::Status => "status".to_string(),
            LogTag::Transactions => "transactions".to_string(),
            LogTag::LedgerActions => "ledger".to_string(),
            LogTag::Defi => "defi".to_string(),
            LogTag::Tokens => "tokens".to_string(),
            LogTag::Accounts => "accounts".to_string(),
            LogTag::Notifications => "notifications".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::System => "system".to_string(),
            LogTag::Test => "test".to_string(),
            LogTag::Other(s) => s.to_lowercase(),
        }
    }

    /// Uncolored label for file output
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::Api => "API".to_string(),
            LogTag::Tasks => "TASKS".to_string(),
            LogTag::Cache => "CACHE".to_string(),
            LogTag::Status => "STATUS".to_string(),
            LogTag::Transactions => "TX".to_string(),
            LogTag::LedgerActions => "LEDGER".to_string(),
            LogTag::Defi => "DEFI".to_string(),
            LogTag::Tokens => "TOKENS".to_string(),
            LogTag::Accounts => "ACCOUNTS".to_string(),
            LogTag::Notifications => "NOTIFY".to_string(),
            LogTag::Config => "CONFIG".to_string(),
            LogTag::System => "SYSTEM".to_string(),
            LogTag::Test => "TEST".to_string(),
            LogTag::Other(s) => s.to_uppercase(),
        }
    }
}
