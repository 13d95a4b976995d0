/// Error taxonomy for the folio client
///
/// Every fallible operation in the crate returns `FolioResult<T>`. API-layer
/// failures (`Network`, `Http`, `Validation`) propagate up to the store action
/// that issued the request; the store converts them into a notification and
/// leaves its previous state untouched.
use thiserror::Error;

use crate::tasks::TaskId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FolioError {
    /// Transport failure or aborted request. Only retried by user action.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx status, or a 2xx envelope without a result.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Response body does not match the expected shape (client/backend skew).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend reported the async task as failed. Message is user-facing.
    #[error("{message}")]
    TaskFailed { task_id: TaskId, message: String },

    /// Backend cancelled the async task (e.g. superseded request).
    #[error("Task {task_id} was cancelled: {message}")]
    TaskCancelled { task_id: TaskId, message: String },

    /// Invariant violation, fatal to the current operation.
    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type FolioResult<T> = Result<T, FolioError>;

impl FolioError {
    /// Cancellations clear in-progress state silently instead of being surfaced.
    pub fn is_benign(&self) -> bool {
        matches!(self, FolioError::TaskCancelled { .. })
    }

    /// Only transport errors make sense to retry, and only on user request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FolioError::Network(_))
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, FolioError::Assertion(_) | FolioError::Config(_))
    }

    pub fn validation(context: &str, err: impl std::fmt::Display) -> Self {
        FolioError::Validation(format!("{}: {}", context, err))
    }
}

/// Fail with `FolioError::Assertion` unless `condition` holds
pub fn assert_that(condition: bool, message: &str) -> FolioResult<()> {
    if condition {
        Ok(())
    } else {
        Err(FolioError::Assertion(message.to_string()))
    }
}

impl From<reqwest::Error> for FolioError {
    fn from(err: reqwest::Error) -> Self {
        FolioError::Network(err.to_string())
    }
}
