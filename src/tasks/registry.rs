/// Registry of in-flight backend tasks with a shared polling monitor
///
/// Callers submit the `PendingTask` they got from an `async_query` request and
/// then await it. A single monitor task polls the backend on a fixed interval
/// for every awaited task; it is started by the first waiter and stops once
/// nothing is awaited. Submissions are not deduplicated: callers check
/// `is_running` before starting an overlapping operation.
use super::types::{
    MatchCriteria, PendingTask, TaskId, TaskIdList, TaskMeta, TaskOutcome, TaskResult, TaskType,
};
use crate::errors::{FolioError, FolioResult};
use crate::logger::{self, LogTag};
use crate::observable::Observable;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::MissedTickBehavior;

/// Waiters fail with the last network error after this many failed polls in a
/// row, counted for the id listing and for each task's outcome query
const MAX_CONSECUTIVE_POLL_FAILURES: u32 = 5;

/// Task status endpoints of the backend
#[async_trait]
pub trait TaskBackend: Send + Sync {
    async fn task_ids(&self) -> FolioResult<TaskIdList>;
    async fn task_outcome(&self, task_id: TaskId) -> FolioResult<TaskOutcome>;
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type: TaskType,
    pub meta: TaskMeta,
    pub cacheable: bool,
    pub submitted_at: DateTime<Utc>,
}

type Delivery = FolioResult<(Value, String)>;

#[derive(Default)]
struct MonitorState {
    waiters: HashMap<TaskId, oneshot::Sender<Delivery>>,
    running: bool,
    consecutive_failures: u32,
    outcome_failures: HashMap<TaskId, u32>,
}

pub struct TaskRegistry {
    backend: Arc<dyn TaskBackend>,
    tasks: Observable<BTreeMap<TaskId, Task>>,
    monitor: Mutex<MonitorState>,
    cached_results: Mutex<HashMap<TaskType, (Value, String)>>,
    poll_interval: Duration,
}

impl TaskRegistry {
    pub fn new(backend: Arc<dyn TaskBackend>, poll_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            backend,
            tasks: Observable::default(),
            monitor: Mutex::new(MonitorState::default()),
            cached_results: Mutex::new(HashMap::new()),
            poll_interval,
        })
    }

    /// Register a backend task so it shows up in `is_running` queries
    pub fn submit(
        &self,
        pending: PendingTask,
        task_type: TaskType,
        meta: TaskMeta,
        cacheable: bool,
    ) -> TaskId {
        let id = pending.task_id;
        logger::info(
            LogTag::Tasks,
            &format!("Submitted {} task {} ({})", task_type, id, meta.title),
        );

        let task = Task {
            id,
            task_type,
            meta,
            cacheable,
            submitted_at: Utc::now(),
        };
        self.tasks.update(|tasks| {
            tasks.insert(id, task);
        });
        id
    }

    /// True while a task of `task_type` whose meta matches `criteria` is outstanding
    pub fn is_running(&self, task_type: TaskType, criteria: &MatchCriteria) -> bool {
        self.tasks.with(|tasks| {
            tasks
                .values()
                .any(|task| task.task_type == task_type && task.meta.matches(criteria))
        })
    }

    pub fn is_type_running(&self, task_type: TaskType) -> bool {
        self.is_running(task_type, &MatchCriteria::new())
    }

    /// Observe the set of outstanding tasks
    pub fn running(&self) -> watch::Receiver<BTreeMap<TaskId, Task>> {
        self.tasks.subscribe()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.with(|tasks| tasks.values().cloned().collect())
    }

    /// Suspend until the backend reports the task finished
    ///
    /// A task id may only be awaited by one caller.
    pub async fn wait<T: DeserializeOwned>(self: &Arc<Self>, task_id: TaskId) -> FolioResult<TaskResult<T>> {
        if !self.tasks.with(|tasks| tasks.contains_key(&task_id)) {
            return Err(FolioError::Assertion(format!(
                "task {} was not submitted",
                task_id
            )));
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.monitor.lock();
            if state.waiters.contains_key(&task_id) {
                return Err(FolioError::Assertion(format!(
                    "task {} is already awaited",
                    task_id
                )));
            }
            state.waiters.insert(task_id, tx);

            if !state.running {
                state.running = true;
                state.consecutive_failures = 0;
                tokio::spawn(Arc::clone(self).run_monitor());
            }
        }

        let (value, message) = rx.await.map_err(|_| FolioError::TaskFailed {
            task_id,
            message: "Task monitor stopped".to_string(),
        })??;

        let result = serde_json::from_value::<T>(value)
            .map_err(|e| FolioError::validation(&format!("task {} result", task_id), e))?;

        Ok(TaskResult { result, message })
    }

    /// Submit and wait in one step
    pub async fn await_task<T: DeserializeOwned>(
        self: &Arc<Self>,
        pending: PendingTask,
        task_type: TaskType,
        meta: TaskMeta,
        cacheable: bool,
    ) -> FolioResult<TaskResult<T>> {
        let task_id = self.submit(pending, task_type, meta, cacheable);
        self.wait(task_id).await
    }

    /// Last successful result of a cacheable task of this type
    pub fn cached_result<T: DeserializeOwned>(&self, task_type: TaskType) -> Option<TaskResult<T>> {
        let (value, message) = self.cached_results.lock().get(&task_type).cloned()?;
        serde_json::from_value(value)
            .ok()
            .map(|result| TaskResult { result, message })
    }

    /// Drop a task locally; its waiter fails with `TaskCancelled`
    pub fn cancel(&self, task_id: TaskId, message: &str) -> bool {
        let known = self.tasks.with(|tasks| tasks.contains_key(&task_id));
        if known {
            self.finish(
                task_id,
                TaskOutcome::Cancelled {
                    message: message.to_string(),
                },
            );
        }
        known
    }

    fn finish(&self, task_id: TaskId, outcome: TaskOutcome) {
        if outcome == TaskOutcome::Pending {
            return;
        }

        let mut removed = None;
        self.tasks.update(|tasks| removed = tasks.remove(&task_id));
        let sender = {
            let mut state = self.monitor.lock();
            state.outcome_failures.remove(&task_id);
            state.waiters.remove(&task_id)
        };

        let delivery = match outcome {
            TaskOutcome::Completed { result, message } => {
                logger::info(LogTag::Tasks, &format!("Task {} completed", task_id));
                if let Some(task) = removed.as_ref().filter(|task| task.cacheable) {
                    self.cached_results
                        .lock()
                        .insert(task.task_type, (result.clone(), message.clone()));
                }
                Ok((result, message))
            }
            TaskOutcome::Failed { message } => {
                logger::warning(
                    LogTag::Tasks,
                    &format!("Task {} failed: {}", task_id, message),
                );
                Err(FolioError::TaskFailed { task_id, message })
            }
            TaskOutcome::Cancelled { message } => {
                logger::debug(
                    LogTag::Tasks,
                    &format!("Task {} cancelled: {}", task_id, message),
                );
                Err(FolioError::TaskCancelled { task_id, message })
            }
            TaskOutcome::NotFound => {
                logger::warning(
                    LogTag::Tasks,
                    &format!("Task {} not found on backend", task_id),
                );
                Err(FolioError::TaskFailed {
                    task_id,
                    message: format!("Task {} not found on backend", task_id),
                })
            }
            TaskOutcome::Pending => return,
        };

        if let Some(tx) = sender {
            let _ = tx.send(delivery);
        }
    }

    async fn run_monitor(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        logger::debug(LogTag::Tasks, "Task monitor started");

        loop {
            ticker.tick().await;

            let awaited: Vec<TaskId> = {
                let mut state = self.monitor.lock();
                if state.waiters.is_empty() {
                    state.running = false;
                    logger::debug(LogTag::Tasks, "Task monitor stopped, nothing awaited");
                    return;
                }
                state.waiters.keys().copied().collect()
            };

            self.poll_once(&awaited).await;
        }
    }

    async fn poll_once(&self, awaited: &[TaskId]) {
        let ids = match self.backend.task_ids().await {
            Ok(ids) => {
                self.monitor.lock().consecutive_failures = 0;
                ids
            }
            Err(e) => {
                self.record_poll_failure(e);
                return;
            }
        };

        for &task_id in awaited {
            if ids.completed.contains(&task_id) {
                match self.backend.task_outcome(task_id).await {
                    Ok(outcome) => self.finish(task_id, outcome),
                    Err(e) => self.record_outcome_failure(task_id, e),
                }
            } else if !ids.pending.contains(&task_id) {
                self.finish(task_id, TaskOutcome::NotFound);
            }
        }
    }

    fn record_outcome_failure(&self, task_id: TaskId, error: FolioError) {
        let sender = {
            let mut state = self.monitor.lock();
            let failures = state.outcome_failures.entry(task_id).or_default();
            *failures += 1;
            logger::warning(
                LogTag::Tasks,
                &format!(
                    "Failed to query outcome of task {} ({}/{}): {}",
                    task_id, failures, MAX_CONSECUTIVE_POLL_FAILURES, error
                ),
            );
            if *failures < MAX_CONSECUTIVE_POLL_FAILURES {
                return;
            }
            state.outcome_failures.remove(&task_id);
            state.waiters.remove(&task_id)
        };

        self.tasks.update(|tasks| {
            tasks.remove(&task_id);
        });
        if let Some(tx) = sender {
            let _ = tx.send(Err(error));
        }
    }

    fn record_poll_failure(&self, error: FolioError) {
        let failed: Vec<(TaskId, oneshot::Sender<Delivery>)> = {
            let mut state = self.monitor.lock();
            state.consecutive_failures += 1;
            logger::warning(
                LogTag::Tasks,
                &format!(
                    "Task poll failed ({}/{}): {}",
                    state.consecutive_failures, MAX_CONSECUTIVE_POLL_FAILURES, error
                ),
            );
            if state.consecutive_failures < MAX_CONSECUTIVE_POLL_FAILURES {
                return;
            }
            state.consecutive_failures = 0;
            state.outcome_failures.clear();
            state.waiters.drain().collect()
        };

        for (task_id, tx) in failed {
            self.tasks.update(|tasks| {
                tasks.remove(&task_id);
            });
            let _ = tx.send(Err(error.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::ScriptedTaskBackend;
    use crate::tasks::types::criteria;
    use serde_json::json;

    fn registry(backend: &Arc<ScriptedTaskBackend>) -> Arc<TaskRegistry> {
        TaskRegistry::new(backend.clone(), Duration::from_millis(5))
    }

    fn pending(id: u64) -> PendingTask {
        PendingTask {
            task_id: TaskId(id),
        }
    }

    #[tokio::test]
    async fn test_await_completed_task() {
        let backend = Arc::new(ScriptedTaskBackend::new());
        let registry = registry(&backend);

        let meta = TaskMeta::new("Detect tokens").with_field("chain", "eth");
        let id = registry.submit(pending(1), TaskType::FetchDetectedTokens, meta, false);
        assert!(registry.is_running(TaskType::FetchDetectedTokens, &criteria([("chain", "eth")])));
        assert!(!registry.is_running(TaskType::FetchDetectedTokens, &criteria([("chain", "optimism")])));
        assert!(!registry.is_type_running(TaskType::Tx));

        backend.complete(1, json!({"tokens": ["ETH"]}));
        let result: TaskResult<Value> = registry.wait(id).await.unwrap();

        assert_eq!(result.result, json!({"tokens": ["ETH"]}));
        assert!(!registry.is_type_running(TaskType::FetchDetectedTokens));
        assert!(registry.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_failed_and_cancelled_tasks() {
        let backend = Arc::new(ScriptedTaskBackend::new());
        let registry = registry(&backend);

        backend.fail(2, "Etherscan rate limited");
        let err = registry
            .await_task::<Value>(pending(2), TaskType::Tx, TaskMeta::new("tx"), true)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FolioError::TaskFailed {
                task_id: TaskId(2),
                message: "Etherscan rate limited".to_string()
            }
        );

        backend.cancel(3, "superseded");
        let err = registry
            .await_task::<Value>(pending(3), TaskType::Tx, TaskMeta::new("tx"), true)
            .await
            .unwrap_err();
        assert!(err.is_benign());
    }

    #[tokio::test]
    async fn test_single_shared_poll_for_concurrent_waiters() {
        let backend = Arc::new(ScriptedTaskBackend::new());
        let registry = registry(&backend);

        backend.complete(10, json!(1));
        backend.complete(11, json!(2));
        let a = registry.await_task::<u32>(pending(10), TaskType::Tx, TaskMeta::new("a"), false);
        let b = registry.await_task::<u32>(pending(11), TaskType::Tx, TaskMeta::new("b"), false);
        let (a, b) = tokio::join!(a, b);

        assert_eq!(a.unwrap().result, 1);
        assert_eq!(b.unwrap().result, 2);
        assert_eq!(backend.id_polls(), 1);
    }

    #[tokio::test]
    async fn test_pending_task_is_polled_until_done() {
        let backend = Arc::new(ScriptedTaskBackend::new());
        let registry = registry(&backend);
        backend.hold(20);

        let id = registry.submit(pending(20), TaskType::LedgerActions, TaskMeta::new("l"), false);
        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.wait::<String>(id).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(registry.is_type_running(TaskType::LedgerActions));

        backend.complete(20, json!("done"));
        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result.result, "done");
        assert!(backend.id_polls() > 1);
    }

    #[tokio::test]
    async fn test_unknown_task_on_backend_fails() {
        let backend = Arc::new(ScriptedTaskBackend::new());
        let registry = registry(&backend);

        let err = registry
            .await_task::<Value>(pending(30), TaskType::Tx, TaskMeta::new("tx"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, FolioError::TaskFailed { task_id: TaskId(30), .. }));
    }

    #[tokio::test]
    async fn test_result_shape_mismatch_is_validation_error() {
        let backend = Arc::new(ScriptedTaskBackend::new());
        let registry = registry(&backend);

        backend.complete(40, json!({"unexpected": true}));
        let err = registry
            .await_task::<Vec<String>>(pending(40), TaskType::Tx, TaskMeta::new("tx"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, FolioError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cacheable_results_are_retained() {
        let backend = Arc::new(ScriptedTaskBackend::new());
        let registry = registry(&backend);

        backend.complete(50, json!([1, 2, 3]));
        backend.complete(51, json!([9]));
        registry
            .await_task::<Vec<u32>>(pending(50), TaskType::DefiBalances, TaskMeta::new("d"), true)
            .await
            .unwrap();
        registry
            .await_task::<Vec<u32>>(pending(51), TaskType::Tx, TaskMeta::new("t"), false)
            .await
            .unwrap();

        let cached: TaskResult<Vec<u32>> = registry.cached_result(TaskType::DefiBalances).unwrap();
        assert_eq!(cached.result, vec![1, 2, 3]);
        assert!(registry.cached_result::<Vec<u32>>(TaskType::Tx).is_none());
    }

    #[tokio::test]
    async fn test_wait_requires_submission_and_single_waiter() {
        let backend = Arc::new(ScriptedTaskBackend::new());
        let registry = registry(&backend);

        let err = registry.wait::<Value>(TaskId(60)).await.unwrap_err();
        assert!(err.is_critical());

        backend.hold(61);
        let id = registry.submit(pending(61), TaskType::Tx, TaskMeta::new("t"), false);
        let first = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.wait::<Value>(id).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = registry.wait::<Value>(id).await.unwrap_err();
        assert!(matches!(err, FolioError::Assertion(_)));

        assert!(registry.cancel(id, "user request"));
        assert!(first.await.unwrap().unwrap_err().is_benign());
    }

    #[tokio::test]
    async fn test_waiters_fail_after_repeated_poll_errors() {
        let backend = Arc::new(ScriptedTaskBackend::new());
        let registry = registry(&backend);
        backend.hold(70);
        backend.set_offline(true);

        let err = registry
            .await_task::<Value>(pending(70), TaskType::Tx, TaskMeta::new("t"), false)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(!registry.is_type_running(TaskType::Tx));
    }

    #[tokio::test]
    async fn test_unreadable_outcome_fails_waiter() {
        let backend = Arc::new(ScriptedTaskBackend::new());
        let registry = registry(&backend);
        backend.complete(80, json!(true));
        backend.fail_outcome(80);
        backend.complete(81, json!(2));

        let broken = registry.await_task::<bool>(pending(80), TaskType::Tx, TaskMeta::new("a"), false);
        let healthy = registry.await_task::<u32>(pending(81), TaskType::Tx, TaskMeta::new("b"), false);
        let (broken, healthy) = tokio::join!(broken, healthy);

        let err = broken.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(healthy.unwrap().result, 2);
        assert_eq!(
            backend.outcome_queries(80),
            MAX_CONSECUTIVE_POLL_FAILURES as usize
        );
        assert!(!registry.is_type_running(TaskType::Tx));
    }

    #[tokio::test]
    async fn test_outcome_recovers_before_limit() {
        let backend = Arc::new(ScriptedTaskBackend::new());
        let registry = registry(&backend);
        backend.complete(90, json!("ok"));
        backend.fail_outcome(90);

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .await_task::<String>(pending(90), TaskType::Tx, TaskMeta::new("t"), false)
                    .await
            })
        };
        while backend.outcome_queries(90) < 2 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        backend.restore_outcome(90);

        assert_eq!(waiter.await.unwrap().unwrap().result, "ok");
    }
}
