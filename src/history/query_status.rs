/// Per-account progress of transaction queries
use super::types::EvmChainAddress;
use crate::observable::Observable;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxQueryStep {
    QueryingTransactionsStarted,
    QueryingTransactions,
    QueryingInternalTransactions,
    QueryingEvmTokensTransactions,
    QueryingTransactionsFinished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxQueryStatus {
    pub step: TxQueryStep,
    /// `[from, to]` of the range being queried, when known
    pub period: Option<(i64, i64)>,
}

#[derive(Debug, Default)]
pub struct TxQueryStatusStore {
    statuses: Observable<BTreeMap<EvmChainAddress, TxQueryStatus>>,
}

impl TxQueryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_step(&self, account: &EvmChainAddress, step: TxQueryStep) {
        self.set_status(
            account,
            TxQueryStatus {
                step,
                period: None,
            },
        );
    }

    pub fn set_status(&self, account: &EvmChainAddress, status: TxQueryStatus) {
        self.statuses.update(|map| {
            map.insert(account.clone(), status);
        });
    }

    pub fn get(&self, account: &EvmChainAddress) -> Option<TxQueryStatus> {
        self.statuses.with(|map| map.get(account).cloned())
    }

    pub fn statuses(&self) -> BTreeMap<EvmChainAddress, TxQueryStatus> {
        self.statuses.get()
    }

    pub fn remove_query_status(&self, account: &EvmChainAddress) {
        self.statuses.update(|map| {
            map.remove(account);
        });
    }

    pub fn reset_query_status(&self) {
        self.statuses.set(BTreeMap::new());
    }

    /// Every tracked account reached the final step
    pub fn is_all_finished(&self) -> bool {
        self.statuses.with(|map| {
            map.values()
                .all(|s| s.step == TxQueryStep::QueryingTransactionsFinished)
        })
    }

    pub fn subscribe(
        &self,
    ) -> tokio::sync::watch::Receiver<BTreeMap<EvmChainAddress, TxQueryStatus>> {
        self.statuses.subscribe()
    }
}
