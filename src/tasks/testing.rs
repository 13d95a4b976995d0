//! In-memory task backend for tests

use super::{TaskBackend, TaskId, TaskIdList, TaskOutcome};
use crate::errors::{FolioError, FolioResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Tasks resolve to whatever outcome was scripted for their id; unscripted ids
/// are unknown to the backend
#[derive(Default)]
pub struct ScriptedTaskBackend {
    outcomes: Mutex<HashMap<u64, TaskOutcome>>,
    offline: AtomicBool,
    id_polls: AtomicUsize,
    unreadable: Mutex<HashSet<u64>>,
    outcome_queries: Mutex<HashMap<u64, usize>>,
}

impl ScriptedTaskBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete(&self, id: u64, result: Value) {
        self.script(
            id,
            TaskOutcome::Completed {
                result,
                message: String::new(),
            },
        );
    }

    pub fn fail(&self, id: u64, message: &str) {
        self.script(
            id,
            TaskOutcome::Failed {
                message: message.to_string(),
            },
        );
    }

    pub fn cancel(&self, id: u64, message: &str) {
        self.script(
            id,
            TaskOutcome::Cancelled {
                message: message.to_string(),
            },
        );
    }

    /// Keep the task pending until it is scripted otherwise
    pub fn hold(&self, id: u64) {
        self.script(id, TaskOutcome::Pending);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Listed as completed, but querying its outcome errors
    pub fn fail_outcome(&self, id: u64) {
        self.unreadable.lock().insert(id);
    }

    pub fn restore_outcome(&self, id: u64) {
        self.unreadable.lock().remove(&id);
    }

    pub fn outcome_queries(&self, id: u64) -> usize {
        self.outcome_queries.lock().get(&id).copied().unwrap_or_default()
    }

    pub fn id_polls(&self) -> usize {
        self.id_polls.load(Ordering::SeqCst)
    }

    fn script(&self, id: u64, outcome: TaskOutcome) {
        self.outcomes.lock().insert(id, outcome);
    }
}

#[async_trait]
impl TaskBackend for ScriptedTaskBackend {
    async fn task_ids(&self) -> FolioResult<TaskIdList> {
        self.id_polls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(FolioError::Network("connection refused".to_string()));
        }

        let outcomes = self.outcomes.lock();
        let mut ids = TaskIdList::default();
        for (id, outcome) in outcomes.iter() {
            if *outcome == TaskOutcome::Pending {
                ids.pending.push(TaskId(*id));
            } else {
                ids.completed.push(TaskId(*id));
            }
        }
        Ok(ids)
    }

    async fn task_outcome(&self, task_id: TaskId) -> FolioResult<TaskOutcome> {
        *self.outcome_queries.lock().entry(task_id.0).or_default() += 1;
        if self.unreadable.lock().contains(&task_id.0) {
            return Err(FolioError::Network("outcome request timed out".to_string()));
        }
        Ok(self
            .outcomes
            .lock()
            .get(&task_id.0)
            .cloned()
            .unwrap_or(TaskOutcome::NotFound))
    }
}
