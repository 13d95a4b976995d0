use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Backend-assigned task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Response of an `async_query=true` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTask {
    pub task_id: TaskId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Tx,
    TxEvents,
    LedgerActions,
    DefiBalances,
    DefiModuleBalances,
    FetchDetectedTokens,
    Erc20Details,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Tx => "tx",
            TaskType::TxEvents => "tx_events",
            TaskType::LedgerActions => "ledger_actions",
            TaskType::DefiBalances => "defi_balances",
            TaskType::DefiModuleBalances => "defi_module_balances",
            TaskType::FetchDetectedTokens => "fetch_detected_tokens",
            TaskType::Erc20Details => "erc20_details",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subset of meta fields a running task must carry to match
pub type MatchCriteria = BTreeMap<String, String>;

/// Build criteria from `(field, value)` pairs
pub fn criteria<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> MatchCriteria
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// UI title/description plus the type-specific fields used for matching
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TaskMeta {
    pub title: String,
    pub description: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl TaskMeta {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Every criteria field must be present with the same value
    pub fn matches(&self, criteria: &MatchCriteria) -> bool {
        criteria
            .iter()
            .all(|(key, value)| self.fields.get(key) == Some(value))
    }
}

/// Final state of a backend task as reported by the task endpoints
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Pending,
    Completed {
        result: serde_json::Value,
        message: String,
    },
    Failed {
        message: String,
    },
    Cancelled {
        message: String,
    },
    NotFound,
}

/// Ids the backend currently knows about
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskIdList {
    #[serde(default)]
    pub pending: Vec<TaskId>,
    #[serde(default)]
    pub completed: Vec<TaskId>,
}

/// Typed result of a completed task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult<T> {
    pub result: T,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_matching() {
        let meta = TaskMeta::new("Detecting tokens")
            .with_field("chain", "eth")
            .with_field("address", "0xA");

        assert!(meta.matches(&MatchCriteria::new()));
        assert!(meta.matches(&criteria([("chain", "eth")])));
        assert!(meta.matches(&criteria([("chain", "eth"), ("address", "0xA")])));
        assert!(!meta.matches(&criteria([("chain", "eth"), ("address", "0xB")])));
        assert!(!meta.matches(&criteria([("location", "kraken")])));
    }

    #[test]
    fn test_pending_task_wire_shape() {
        let pending: PendingTask = serde_json::from_str(r#"{"task_id": 42}"#).unwrap();
        assert_eq!(pending.task_id, TaskId(42));
    }
}
