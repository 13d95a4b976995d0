/// Ledger actions collection store
use super::collection::Page;
use super::types::{
    ActionStatus, LedgerAction, LedgerActionCollection, LedgerActionEntry,
    LedgerActionRequestPayload, NewLedgerAction,
};
use crate::apis::LedgerActionsApi;
use crate::errors::FolioResult;
use crate::logger::{self, LogTag};
use crate::notifications::{NotificationPayload, NotificationStore};
use crate::observable::Observable;
use crate::session::StoreContext;
use crate::status::{Section, Status, StatusStore, StatusUpdater};
use crate::tasks::{TaskMeta, TaskRegistry, TaskResult, TaskType};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

pub type LedgerActionPage = Page<LedgerActionEntry, LedgerActionRequestPayload>;

pub struct LedgerActionsStore {
    api: Arc<dyn LedgerActionsApi>,
    tasks: Arc<TaskRegistry>,
    statuses: Arc<StatusStore>,
    notifications: Arc<NotificationStore>,
    page: Observable<LedgerActionPage>,
    payload: Mutex<LedgerActionRequestPayload>,
    cycle: tokio::sync::Mutex<()>,
}

impl LedgerActionsStore {
    pub fn new(api: Arc<dyn LedgerActionsApi>, context: &StoreContext, default_limit: u32) -> Arc<Self> {
        Arc::new(Self {
            api,
            tasks: context.tasks.clone(),
            statuses: context.statuses.clone(),
            notifications: context.notifications.clone(),
            page: Observable::default(),
            payload: Mutex::new(LedgerActionRequestPayload::first_page(default_limit)),
            cycle: tokio::sync::Mutex::new(()),
        })
    }

    pub fn ledger_actions(&self) -> LedgerActionCollection {
        self.page.with(|page| page.collection.clone())
    }

    pub fn page(&self) -> LedgerActionPage {
        self.page.get()
    }

    pub fn payload(&self) -> LedgerActionRequestPayload {
        self.payload.lock().clone()
    }

    pub fn status(&self) -> Status {
        self.statuses.updater(Section::LedgerActions).get_status()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<LedgerActionPage> {
        self.page.subscribe()
    }

    /// Run one fetch cycle
    ///
    /// With `only_location` the backend refresh is limited to that location,
    /// the cached page is left alone and the section status does not move.
    /// While another cycle runs, a call that would refresh is dropped and a
    /// cache read waits for its turn.
    pub async fn fetch_ledger_actions(&self, refresh: bool, only_location: Option<String>) {
        let wants_refresh = refresh || only_location.is_some() || self.status() == Status::None;
        let _cycle = match self.cycle.try_lock() {
            Ok(guard) => guard,
            Err(_) if wants_refresh => {
                logger::debug(
                    LogTag::LedgerActions,
                    "Ledger actions refresh already in progress, skipping",
                );
                return;
            }
            Err(_) => self.cycle.lock().await,
        };
        let status = match only_location {
            Some(_) => self.statuses.ignoring_updater(Section::LedgerActions),
            None => self.statuses.updater(Section::LedgerActions),
        };

        if let Err(e) = self.run_cycle(&status, refresh, only_location.as_deref()).await {
            logger::error(
                LogTag::LedgerActions,
                &format!("Ledger actions fetch failed: {}", e),
            );
            status.reset_status();
        }
    }

    pub async fn update_payload(&self, payload: LedgerActionRequestPayload) -> bool {
        {
            let mut current = self.payload.lock();
            if *current == payload {
                return false;
            }
            *current = payload;
        }
        self.fetch_ledger_actions(false, None).await;
        true
    }

    async fn run_cycle(
        &self,
        status: &StatusUpdater,
        refresh: bool,
        only_location: Option<&str>,
    ) -> FolioResult<()> {
        let task_running = self.tasks.is_type_running(TaskType::LedgerActions);
        let Some(plan) = status.begin_fetch(task_running, |first_load| !first_load && !refresh)
        else {
            logger::debug(
                LogTag::LedgerActions,
                "Ledger actions refresh already in progress, skipping",
            );
            return Ok(());
        };

        let payload = self.payload.lock().clone();
        if only_location.is_none() {
            self.read_cache(&payload).await?;
        }

        if !plan.only_cache || only_location.is_some() {
            status.set_status(Status::Refreshing);
            self.refresh(only_location).await;
            if only_location.is_none() {
                self.read_cache(&payload).await?;
            }
        }

        status.set_status(if self.tasks.is_type_running(TaskType::LedgerActions) {
            Status::Refreshing
        } else {
            Status::Loaded
        });
        Ok(())
    }

    async fn read_cache(&self, payload: &LedgerActionRequestPayload) -> FolioResult<()> {
        let request = LedgerActionRequestPayload {
            only_cache: true,
            ..payload.clone()
        };
        let collection = LedgerActionCollection::from(self.api.get_ledger_actions(&request).await?);
        self.page.set(LedgerActionPage {
            payload: Some(payload.clone()),
            collection,
        });
        Ok(())
    }

    async fn refresh(&self, location: Option<&str>) {
        let scope = location.unwrap_or("all exchanges");
        match self.refresh_task(location).await {
            Ok(()) => logger::info(
                LogTag::LedgerActions,
                &format!("Refreshed ledger actions of {}", scope),
            ),
            Err(e) if e.is_benign() => logger::debug(
                LogTag::LedgerActions,
                &format!("Ledger actions refresh of {} cancelled", scope),
            ),
            Err(e) => {
                self.notifications.notify(NotificationPayload::error(
                    "Ledger actions refresh failed",
                    format!("Failed to refresh ledger actions of {}: {}", scope, e),
                ));
            }
        }
    }

    async fn refresh_task(&self, location: Option<&str>) -> FolioResult<()> {
        let payload = LedgerActionRequestPayload::refresh(location.map(str::to_string));
        let pending = self.api.get_ledger_actions_task(&payload).await?;
        let mut meta = TaskMeta::new("Refreshing ledger actions");
        if let Some(location) = location {
            meta = meta.with_field("location", location);
        }

        // only completion matters, the page is re-read from cache
        let _: TaskResult<Value> = self
            .tasks
            .await_task(pending, TaskType::LedgerActions, meta, false)
            .await?;
        Ok(())
    }

    pub async fn add_ledger_action(&self, action: &NewLedgerAction) -> ActionStatus {
        let status = ActionStatus::from_result(&self.api.add_ledger_action(action).await);
        if status.is_success() {
            self.fetch_ledger_actions(false, None).await;
        }
        status
    }

    pub async fn edit_ledger_action(&self, action: &LedgerAction) -> ActionStatus {
        let status = ActionStatus::from_result(&self.api.edit_ledger_action(action).await);
        if status.is_success() {
            self.fetch_ledger_actions(false, None).await;
        }
        status
    }

    pub async fn delete_ledger_action(&self, identifier: u64) -> ActionStatus {
        let status = ActionStatus::from_flag(&self.api.delete_ledger_actions(&[identifier]).await);
        if status.is_success() {
            self.fetch_ledger_actions(false, None).await;
        }
        status
    }
}
