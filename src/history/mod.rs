//! Paginated history collections: transactions and ledger actions

mod collection;
mod ledger_actions;
mod purge;
mod query_status;
mod transactions;
mod types;

pub use collection::{Collection, CollectionResponse, Entry, EntryWithMeta, Page};
pub use ledger_actions::{LedgerActionPage, LedgerActionsStore};
pub use purge::{PurgeStore, PurgeTarget};
pub use query_status::{TxQueryStatus, TxQueryStatusStore, TxQueryStep};
pub use transactions::{TransactionPage, TransactionStore};
pub use types::*;
