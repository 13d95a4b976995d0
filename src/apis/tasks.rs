/// Task status endpoints
use super::client::{ApiClient, Request};
use super::wire::VALID_TASK_STATUS;
use crate::errors::FolioResult;
use crate::tasks::{TaskBackend, TaskId, TaskIdList, TaskOutcome};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum TaskState {
    Pending,
    Completed,
    Failed,
    Cancelled,
    NotFound,
}

#[derive(Debug, Deserialize)]
struct Outcome {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    message: String,
}

/// `{ status, outcome }` of one task
#[derive(Debug, Deserialize)]
struct TaskStatusResponse {
    status: TaskState,
    #[serde(default)]
    outcome: Option<Outcome>,
}

impl From<TaskStatusResponse> for TaskOutcome {
    fn from(response: TaskStatusResponse) -> Self {
        let (result, message) = match response.outcome {
            Some(outcome) => (outcome.result, outcome.message),
            None => (None, String::new()),
        };

        match response.status {
            TaskState::Pending => TaskOutcome::Pending,
            TaskState::NotFound => TaskOutcome::NotFound,
            TaskState::Cancelled => TaskOutcome::Cancelled { message },
            TaskState::Failed => TaskOutcome::Failed { message },
            // a completed task without a result failed on the backend
            TaskState::Completed => match result {
                Some(result) if !result.is_null() => TaskOutcome::Completed { result, message },
                _ => TaskOutcome::Failed { message },
            },
        }
    }
}

#[async_trait]
impl TaskBackend for ApiClient {
    async fn task_ids(&self) -> FolioResult<TaskIdList> {
        self.send(Request::get("tasks")).await
    }

    async fn task_outcome(&self, task_id: TaskId) -> FolioResult<TaskOutcome> {
        let path = format!("tasks/{}", task_id);
        let response: TaskStatusResponse = self
            .send(Request::get(&path).allow(VALID_TASK_STATUS))
            .await?;
        Ok(response.into())
    }
}
