/// Per-section data freshness tracking
///
/// Each data section moves through `None → Loading → (PartiallyLoaded) →
/// Loaded`, re-entering `Refreshing` on manual refresh. Consumers must not
/// read a section's collection while its status is `None`.
use crate::logger::{self, LogTag};
use crate::observable::Observable;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Section {
    Tx,
    LedgerActions,
    Trades,
    AssetMovement,
    BlockchainAccounts,
    DefiOverview,
    DefiBalances,
    DefiAaveBalances,
    DefiCompoundBalances,
    DefiYearnVaultsBalances,
    DefiYearnVaultsV2Balances,
    DefiLiquityBalances,
    DefiDsrBalances,
    DefiMakerdaoVaults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Status {
    #[default]
    None,
    Loading,
    Refreshing,
    PartiallyLoaded,
    Loaded,
}

impl Status {
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            Status::Loading | Status::Refreshing | Status::PartiallyLoaded
        )
    }

    /// Data is present and may be shown
    pub fn is_settled_or_refreshing(&self) -> bool {
        matches!(self, Status::Loaded | Status::Refreshing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusKey {
    pub section: Section,
    pub subsection: Option<String>,
}

impl StatusKey {
    pub fn new(section: Section) -> Self {
        Self {
            section,
            subsection: None,
        }
    }
}

/// Outcome of `StatusUpdater::begin_fetch`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    pub first_load: bool,
    pub only_cache: bool,
}

#[derive(Debug, Default)]
pub struct StatusStore {
    statuses: Observable<HashMap<StatusKey, Status>>,
    // serializes check-and-set sequences
    transition: Mutex<()>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &StatusKey) -> Status {
        self.statuses
            .with(|map| map.get(key).copied().unwrap_or_default())
    }

    pub fn set(&self, key: StatusKey, status: Status) {
        if self.get(&key) == status {
            return;
        }
        logger::debug(
            LogTag::Status,
            &format!("{:?}{} -> {:?}", key.section, subsection_suffix(&key), status),
        );
        self.statuses.update(|map| {
            map.insert(key, status);
        });
    }

    pub fn reset(&self, key: &StatusKey) {
        self.statuses.update(|map| {
            map.remove(key);
        });
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<HashMap<StatusKey, Status>> {
        self.statuses.subscribe()
    }

    /// Handle bound to one section
    pub fn updater(self: &Arc<Self>, section: Section) -> StatusUpdater {
        StatusUpdater {
            store: Arc::clone(self),
            section,
            ignore: false,
        }
    }

    /// Handle whose writes are no-ops, for partial fetches (e.g. a single
    /// location) that must not move the section's status
    pub fn ignoring_updater(self: &Arc<Self>, section: Section) -> StatusUpdater {
        StatusUpdater {
            store: Arc::clone(self),
            section,
            ignore: true,
        }
    }
}

fn subsection_suffix(key: &StatusKey) -> String {
    key.subsection
        .as_ref()
        .map(|s| format!("/{}", s))
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct StatusUpdater {
    store: Arc<StatusStore>,
    section: Section,
    ignore: bool,
}

impl StatusUpdater {
    pub fn section(&self) -> Section {
        self.section
    }

    pub fn get_status(&self) -> Status {
        self.get_status_of(self.section)
    }

    pub fn get_status_of(&self, section: Section) -> Status {
        self.store.get(&StatusKey::new(section))
    }

    pub fn set_status(&self, status: Status) {
        self.set_status_of(self.section, status);
    }

    pub fn set_status_of(&self, section: Section, status: Status) {
        if self.ignore {
            return;
        }
        self.store.set(StatusKey::new(section), status);
    }

    pub fn reset_status(&self) {
        self.reset_status_of(self.section);
    }

    pub fn reset_status_of(&self, section: Section) {
        if self.ignore {
            return;
        }
        self.store.reset(&StatusKey::new(section));
    }

    pub fn is_first_load(&self) -> bool {
        self.get_status() == Status::None
    }

    pub fn loading(&self) -> bool {
        self.get_status().is_loading()
    }

    /// A fetch is pointless when data is already there and no refresh was
    /// asked for, or when one is already in progress
    pub fn fetch_disabled(&self, refresh: bool) -> bool {
        self.fetch_disabled_of(self.section, refresh)
    }

    pub fn fetch_disabled_of(&self, section: Section, refresh: bool) -> bool {
        let status = self.get_status_of(section);
        let first_load = status == Status::None;
        !(first_load || refresh) || status.is_loading()
    }

    /// Atomically check `fetch_disabled_of` and mark `section` started
    ///
    /// Returns false when the fetch must not run. Of several concurrent
    /// callers at most one gets true.
    pub fn try_begin(&self, section: Section, refresh: bool) -> bool {
        let _guard = self.store.transition.lock();

        if self.fetch_disabled_of(section, refresh) {
            return false;
        }
        let first_load = self.get_status_of(section) == Status::None;
        self.set_status_of(
            section,
            if first_load {
                Status::Loading
            } else {
                Status::Refreshing
            },
        );
        true
    }

    /// Atomically decide whether a fetch cycle may start and mark it started
    ///
    /// `decide_only_cache` receives whether this is the first load and returns
    /// whether the cycle is a pure cache read. A non-cache cycle is refused
    /// while the section is loading or a matching task is running; cache
    /// reads are always allowed.
    pub fn begin_fetch(
        &self,
        task_running: bool,
        decide_only_cache: impl FnOnce(bool) -> bool,
    ) -> Option<FetchPlan> {
        let _guard = self.store.transition.lock();

        let first_load = self.is_first_load();
        let only_cache = decide_only_cache(first_load);
        if (task_running || self.loading()) && !only_cache {
            return None;
        }

        self.set_status(if first_load {
            Status::Loading
        } else {
            Status::Refreshing
        });

        Some(FetchPlan {
            first_load,
            only_cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_load_and_fetch_disabled() {
        let store = Arc::new(StatusStore::new());
        let status = store.updater(Section::DefiBalances);

        assert!(status.is_first_load());
        assert!(!status.fetch_disabled(false));

        status.set_status(Status::Loaded);
        assert!(!status.is_first_load());
        assert!(status.fetch_disabled(false));
        assert!(!status.fetch_disabled(true));

        status.set_status(Status::Refreshing);
        assert!(status.fetch_disabled(true));

        status.reset_status();
        assert_eq!(status.get_status(), Status::None);
    }

    #[test]
    fn test_begin_fetch_refuses_duplicate_refresh() {
        let store = Arc::new(StatusStore::new());
        let status = store.updater(Section::Tx);

        let plan = status.begin_fetch(false, |first| !first).unwrap();
        assert!(plan.first_load);
        assert!(!plan.only_cache);
        assert_eq!(status.get_status(), Status::Loading);

        // a second non-cache cycle while loading is refused
        assert!(status.begin_fetch(false, |_| false).is_none());

        // a pure cache read is still allowed
        let plan = status.begin_fetch(false, |_| true).unwrap();
        assert!(plan.only_cache);

        status.set_status(Status::Loaded);
        assert!(status.begin_fetch(true, |_| false).is_none());
    }

    #[test]
    fn test_ignoring_updater_does_not_write() {
        let store = Arc::new(StatusStore::new());
        let ignoring = store.ignoring_updater(Section::LedgerActions);

        ignoring.set_status(Status::Loading);
        assert_eq!(store.get(&StatusKey::new(Section::LedgerActions)), Status::None);

        store.updater(Section::LedgerActions).set_status(Status::Loaded);
        ignoring.reset_status();
        assert_eq!(ignoring.get_status(), Status::Loaded);
    }

    #[test]
    fn test_try_begin_admits_one_caller() {
        let store = Arc::new(StatusStore::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let status = store.updater(Section::DefiOverview);
                std::thread::spawn(move || status.try_begin(Section::DefiBalances, false))
            })
            .collect();
        let started = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|started| *started)
            .count();

        assert_eq!(started, 1);
        let status = store.updater(Section::DefiOverview);
        assert_eq!(status.get_status_of(Section::DefiBalances), Status::Loading);

        // a refresh is refused while loading, accepted once loaded
        assert!(!status.try_begin(Section::DefiBalances, true));
        status.set_status_of(Section::DefiBalances, Status::Loaded);
        assert!(status.try_begin(Section::DefiBalances, true));
        assert_eq!(status.get_status_of(Section::DefiBalances), Status::Refreshing);
    }
}
