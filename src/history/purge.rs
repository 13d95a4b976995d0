/// Invalidation of history sections after backend data was purged
use super::ledger_actions::LedgerActionsStore;
use super::transactions::TransactionStore;
use crate::logger::{self, LogTag};
use crate::status::{Section, StatusKey, StatusStore};
use std::sync::Arc;

/// Sections that hold exchange-sourced history
const EXCHANGE_SECTIONS: [Section; 3] = [
    Section::Trades,
    Section::AssetMovement,
    Section::LedgerActions,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeTarget {
    AllExchanges,
    Location(String),
}

pub struct PurgeStore {
    statuses: Arc<StatusStore>,
    ledger_actions: Arc<LedgerActionsStore>,
    transactions: Arc<TransactionStore>,
}

impl PurgeStore {
    pub fn new(
        statuses: Arc<StatusStore>,
        ledger_actions: Arc<LedgerActionsStore>,
        transactions: Arc<TransactionStore>,
    ) -> Self {
        Self {
            statuses,
            ledger_actions,
            transactions,
        }
    }

    /// Forget exchange history so the next fetch starts over
    pub async fn purge_exchange(&self, target: PurgeTarget) {
        match target {
            PurgeTarget::AllExchanges => {
                logger::info(LogTag::LedgerActions, "Resetting exchange history sections");
                for section in EXCHANGE_SECTIONS {
                    self.statuses.reset(&StatusKey::new(section));
                }
            }
            PurgeTarget::Location(location) => self.purge_history_location(&location).await,
        }
    }

    /// Refresh the history of one location
    pub async fn purge_history_location(&self, location: &str) {
        logger::info(
            LogTag::LedgerActions,
            &format!("Refreshing history of {}", location),
        );
        self.ledger_actions
            .fetch_ledger_actions(true, Some(location.to_string()))
            .await;
    }

    /// Reset the transactions section and reload it from scratch
    pub async fn purge_transactions(&self) {
        self.statuses.reset(&StatusKey::new(Section::Tx));
        self.transactions.fetch_transactions(false).await;
    }
}
