/// Endpoint groups the stores depend on
///
/// `ApiClient` implements all of them; tests substitute in-memory fakes.
use crate::balances::{ChainInfo, DetectedTokensByAddress, GeneralAccount};
use crate::defi::{Module, ProtocolMetadata};
use crate::errors::FolioResult;
use crate::history::{
    CollectionResponse, EntryWithMeta, EvmTransaction, HistoryEvent, LedgerAction,
    LedgerActionRequestPayload, NewLedgerAction, TransactionEventRequestPayload,
    TransactionRequestPayload,
};
use crate::tasks::PendingTask;
use async_trait::async_trait;

pub type TransactionsResponse = CollectionResponse<EntryWithMeta<EvmTransaction>>;
pub type LedgerActionsResponse = CollectionResponse<EntryWithMeta<LedgerAction>>;

#[async_trait]
pub trait TransactionsApi: Send + Sync {
    /// Cache-only read of the transactions collection
    async fn fetch_transactions(
        &self,
        payload: &TransactionRequestPayload,
    ) -> FolioResult<TransactionsResponse>;

    /// Backend refresh; the task result is a `TransactionsResponse`
    async fn fetch_transactions_task(
        &self,
        payload: &TransactionRequestPayload,
    ) -> FolioResult<PendingTask>;

    /// Decode events of the given transactions; the task result is a bool
    async fn fetch_transaction_events(
        &self,
        payload: &TransactionEventRequestPayload,
    ) -> FolioResult<PendingTask>;

    /// Decode every transaction still missing events on the given chains
    async fn redecode_missing_events(&self, evm_chains: &[String]) -> FolioResult<PendingTask>;

    async fn add_history_event(&self, event: &HistoryEvent) -> FolioResult<u64>;

    async fn edit_history_event(&self, event: &HistoryEvent) -> FolioResult<bool>;

    async fn delete_history_events(&self, identifiers: &[u64]) -> FolioResult<bool>;
}

#[async_trait]
pub trait LedgerActionsApi: Send + Sync {
    async fn get_ledger_actions(
        &self,
        payload: &LedgerActionRequestPayload,
    ) -> FolioResult<LedgerActionsResponse>;

    async fn get_ledger_actions_task(
        &self,
        payload: &LedgerActionRequestPayload,
    ) -> FolioResult<PendingTask>;

    async fn add_ledger_action(&self, action: &NewLedgerAction) -> FolioResult<u64>;

    /// Returns the updated collection
    async fn edit_ledger_action(&self, action: &LedgerAction)
        -> FolioResult<LedgerActionsResponse>;

    async fn delete_ledger_actions(&self, identifiers: &[u64]) -> FolioResult<bool>;
}

#[async_trait]
pub trait DefiApi: Send + Sync {
    /// Positions of every address across protocols; result is `AllDefiProtocols`
    async fn fetch_all_defi(&self) -> FolioResult<PendingTask>;

    /// Balances of one module; result is `ModuleBalances`
    async fn fetch_module_balances(&self, module: Module) -> FolioResult<PendingTask>;

    async fn fetch_defi_metadata(&self) -> FolioResult<Vec<ProtocolMetadata>>;
}

#[async_trait]
pub trait TokensApi: Send + Sync {
    /// Start detection; result is `DetectedTokensByAddress`
    async fn fetch_detected_tokens_task(
        &self,
        chain: &str,
        addresses: &[String],
    ) -> FolioResult<PendingTask>;

    /// Previously detected tokens, without new detection
    async fn get_detected_tokens(
        &self,
        chain: &str,
        addresses: &[String],
    ) -> FolioResult<DetectedTokensByAddress>;
}

#[async_trait]
pub trait AccountsApi: Send + Sync {
    async fn accounts(&self, chain: &str) -> FolioResult<Vec<GeneralAccount>>;
}

#[async_trait]
pub trait ChainsApi: Send + Sync {
    async fn supported_chains(&self) -> FolioResult<Vec<ChainInfo>>;
}
