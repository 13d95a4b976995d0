/// EVM transactions collection store
///
/// A fetch cycle reads the cached page, optionally asks the backend to refresh
/// every transaction-capable account, decodes missing events and re-reads the
/// cache. Cycles never overlap: while one is running, another refresh is
/// refused and a cache read waits for it.
use super::collection::Page;
use super::query_status::{TxQueryStatusStore, TxQueryStep};
use super::types::{
    ActionStatus, EvmChainAddress, HistoryEvent, TransactionCollection, TransactionEntry,
    TransactionEventRequestPayload, TransactionRequestPayload, TxHashesByChain,
};
use crate::apis::{TransactionsApi, TransactionsResponse};
use crate::balances::{AccountsStore, SupportedChains};
use crate::errors::FolioResult;
use crate::logger::{self, LogTag};
use crate::notifications::{NotificationPayload, NotificationStore};
use crate::observable::Observable;
use crate::session::StoreContext;
use crate::status::{Section, Status, StatusUpdater};
use crate::tasks::{TaskMeta, TaskRegistry, TaskResult, TaskType};
use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type TransactionPage = Page<TransactionEntry, TransactionRequestPayload>;

pub struct TransactionStore {
    api: Arc<dyn TransactionsApi>,
    tasks: Arc<TaskRegistry>,
    status: StatusUpdater,
    notifications: Arc<NotificationStore>,
    query_status: Arc<TxQueryStatusStore>,
    chains: Arc<SupportedChains>,
    accounts: Arc<AccountsStore>,
    page: Observable<TransactionPage>,
    payload: Mutex<TransactionRequestPayload>,
    fetched_accounts: Mutex<Vec<EvmChainAddress>>,
    /// Set initially and by `update_payload`, consumed by the next cache read
    page_changed: AtomicBool,
    cycle: tokio::sync::Mutex<()>,
}

impl TransactionStore {
    pub fn new(
        api: Arc<dyn TransactionsApi>,
        context: &StoreContext,
        query_status: Arc<TxQueryStatusStore>,
        chains: Arc<SupportedChains>,
        accounts: Arc<AccountsStore>,
        default_limit: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            api,
            tasks: context.tasks.clone(),
            status: context.statuses.updater(Section::Tx),
            notifications: context.notifications.clone(),
            query_status,
            chains,
            accounts,
            page: Observable::default(),
            payload: Mutex::new(TransactionRequestPayload::first_page(default_limit)),
            fetched_accounts: Mutex::new(Vec::new()),
            page_changed: AtomicBool::new(true),
            cycle: tokio::sync::Mutex::new(()),
        })
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn transactions(&self) -> TransactionCollection {
        self.page.with(|page| page.collection.clone())
    }

    pub fn page(&self) -> TransactionPage {
        self.page.get()
    }

    pub fn payload(&self) -> TransactionRequestPayload {
        self.payload.lock().clone()
    }

    /// Accounts the last refresh ran for
    pub fn fetched_accounts(&self) -> Vec<EvmChainAddress> {
        self.fetched_accounts.lock().clone()
    }

    pub fn status(&self) -> Status {
        self.status.get_status()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<TransactionPage> {
        self.page.subscribe()
    }

    // ========================================================================
    // FETCH CYCLE
    // ========================================================================

    /// Run one fetch cycle; failures reset the section status
    ///
    /// While another cycle runs, a call that would refresh the backend is
    /// dropped and a pure cache read waits for its turn.
    pub async fn fetch_transactions(self: &Arc<Self>, refresh: bool) {
        let _cycle = match self.cycle.try_lock() {
            Ok(guard) => guard,
            Err(_) if self.wants_refresh(refresh) => {
                logger::debug(
                    LogTag::Transactions,
                    "Transactions refresh already in progress, skipping",
                );
                return;
            }
            Err(_) => self.cycle.lock().await,
        };
        if let Err(e) = self.run_cycle(refresh).await {
            logger::error(
                LogTag::Transactions,
                &format!("Transactions fetch failed: {}", e),
            );
            self.status.reset_status();
        }
    }

    /// Store `payload` and fetch when it differs from the current one
    ///
    /// Returns whether a fetch cycle ran.
    pub async fn update_payload(self: &Arc<Self>, payload: TransactionRequestPayload) -> bool {
        {
            let mut current = self.payload.lock();
            if *current == payload {
                return false;
            }
            *current = payload;
        }
        self.page_changed.store(true, Ordering::SeqCst);
        self.fetch_transactions(false).await;
        true
    }

    /// Whether a cycle started now would query the backend
    fn wants_refresh(&self, refresh: bool) -> bool {
        refresh || self.status.is_first_load() || self.accounts_updated(&self.tx_accounts())
    }

    fn accounts_updated(&self, accounts: &[EvmChainAddress]) -> bool {
        self.fetched_accounts.lock().as_slice() != accounts
    }

    async fn run_cycle(self: &Arc<Self>, refresh: bool) -> FolioResult<()> {
        let accounts = self.tx_accounts();
        let accounts_updated = self.accounts_updated(&accounts);
        let task_running = self.tasks.is_type_running(TaskType::Tx);

        let Some(plan) = self.status.begin_fetch(task_running, |first_load| {
            if first_load || accounts_updated {
                false
            } else {
                !refresh
            }
        }) else {
            logger::debug(
                LogTag::Transactions,
                "Transactions refresh already in progress, skipping",
            );
            return Ok(());
        };

        let payload = self.payload.lock().clone();
        self.read_cache(&payload).await?;

        if !plan.only_cache {
            self.status.set_status(Status::Refreshing);
            self.query_status.reset_query_status();
            *self.fetched_accounts.lock() = accounts.clone();

            logger::info(
                LogTag::Transactions,
                &format!("Refreshing transactions of {} accounts", accounts.len()),
            );
            join_all(accounts.iter().map(|account| self.refresh_account(account))).await;

            if let Err(e) = self.redecode_missing_events().await {
                logger::error(
                    LogTag::Transactions,
                    &format!("Decoding missing events failed: {}", e),
                );
            }
            self.read_cache(&payload).await?;
        }

        self.settle_status();
        Ok(())
    }

    /// EVM accounts on chains that support transaction queries
    fn tx_accounts(&self) -> Vec<EvmChainAddress> {
        self.accounts
            .accounts()
            .into_iter()
            .filter(|account| self.chains.supports_transactions(&account.chain))
            .filter_map(|account| {
                self.chains
                    .evm_chain_name(&account.chain)
                    .map(|evm_chain| EvmChainAddress {
                        address: account.address,
                        evm_chain,
                    })
            })
            .collect()
    }

    fn settle_status(&self) {
        self.status.set_status(if self.tasks.is_type_running(TaskType::Tx) {
            Status::Refreshing
        } else {
            Status::Loaded
        });
    }

    async fn read_cache(self: &Arc<Self>, payload: &TransactionRequestPayload) -> FolioResult<()> {
        let request = TransactionRequestPayload {
            only_cache: true,
            ..payload.clone()
        };
        let collection = TransactionCollection::from(self.api.fetch_transactions(&request).await?);

        let undecoded: Vec<TransactionEntry> = collection
            .data
            .iter()
            .filter(|tx| matches!(&tx.decoded_events, Some(events) if events.is_empty()))
            .cloned()
            .collect();

        self.page.set(TransactionPage {
            payload: Some(payload.clone()),
            collection,
        });

        if self.page_changed.swap(false, Ordering::SeqCst) && !undecoded.is_empty() {
            logger::debug(
                LogTag::Transactions,
                &format!("Decoding events of {} transactions on page", undecoded.len()),
            );
            let store = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(e) = store.fetch_transaction_events(Some(undecoded), false).await {
                    logger::warning(
                        LogTag::Transactions,
                        &format!("Decoding page events failed: {}", e),
                    );
                }
            });
        }
        Ok(())
    }

    async fn refresh_account(&self, account: &EvmChainAddress) {
        self.query_status
            .set_step(account, TxQueryStep::QueryingTransactionsStarted);

        match self.refresh_transactions_of(account).await {
            Ok(found) => {
                self.query_status
                    .set_step(account, TxQueryStep::QueryingTransactionsFinished);
                logger::info(
                    LogTag::Transactions,
                    &format!(
                        "Refreshed {} on {}: {} transactions",
                        account.address, account.evm_chain, found
                    ),
                );
            }
            Err(e) if e.is_benign() => {
                logger::debug(
                    LogTag::Transactions,
                    &format!("Refresh of {} on {} cancelled", account.address, account.evm_chain),
                );
                self.query_status.remove_query_status(account);
            }
            Err(e) => {
                self.notifications.notify(NotificationPayload::error(
                    "Transactions refresh failed",
                    format!(
                        "Failed to refresh transactions of {} on {}: {}",
                        account.address, account.evm_chain, e
                    ),
                ));
            }
        }
    }

    async fn refresh_transactions_of(&self, account: &EvmChainAddress) -> FolioResult<u64> {
        let payload = TransactionRequestPayload::refresh_account(account.clone());
        let pending = self.api.fetch_transactions_task(&payload).await?;
        let meta = TaskMeta::new("Refreshing transactions")
            .with_description(format!(
                "Querying transactions of {} on {}",
                account.address, account.evm_chain
            ))
            .with_field("address", account.address.as_str())
            .with_field("evm_chain", account.evm_chain.as_str());

        let refreshed: TaskResult<TransactionsResponse> = self
            .tasks
            .await_task(pending, TaskType::Tx, meta, true)
            .await?;
        Ok(refreshed.result.entries_found)
    }

    // ========================================================================
    // EVENT DECODING
    // ========================================================================

    async fn redecode_missing_events(&self) -> FolioResult<bool> {
        let evm_chains = self.chains.tx_evm_chain_names();
        if evm_chains.is_empty() {
            return Ok(false);
        }
        let pending = self.api.redecode_missing_events(&evm_chains).await?;
        let meta = TaskMeta::new("Decoding missing events")
            .with_description(format!("Decoding events on {}", evm_chains.join(", ")));

        let decoded: TaskResult<bool> = self
            .tasks
            .await_task(pending, TaskType::TxEvents, meta, true)
            .await?;
        Ok(decoded.result)
    }

    /// Redecode missing events everywhere and re-read when anything changed
    pub async fn check_missing_events(self: &Arc<Self>) {
        match self.redecode_missing_events().await {
            Ok(true) => self.refetch().await,
            Ok(false) => {}
            Err(e) => logger::error(
                LogTag::Transactions,
                &format!("Decoding missing events failed: {}", e),
            ),
        }
    }

    /// Decode events of `transactions`, or of every transaction when `None`
    pub async fn fetch_transaction_events(
        self: &Arc<Self>,
        transactions: Option<Vec<TransactionEntry>>,
        ignore_cache: bool,
    ) -> FolioResult<()> {
        let data: Vec<TxHashesByChain> = match transactions {
            None => self
                .chains
                .tx_evm_chain_names()
                .into_iter()
                .map(|evm_chain| TxHashesByChain {
                    evm_chain,
                    tx_hashes: None,
                })
                .collect(),
            Some(transactions) => {
                if transactions.is_empty() {
                    return Ok(());
                }
                let mut by_chain: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for tx in transactions {
                    by_chain
                        .entry(tx.inner.evm_chain)
                        .or_default()
                        .push(tx.inner.tx_hash);
                }
                by_chain
                    .into_iter()
                    .map(|(evm_chain, hashes)| TxHashesByChain {
                        evm_chain,
                        tx_hashes: Some(hashes),
                    })
                    .collect()
            }
        };

        let pending = self
            .api
            .fetch_transaction_events(&TransactionEventRequestPayload { data, ignore_cache })
            .await?;
        let decoded: TaskResult<bool> = self
            .tasks
            .await_task(
                pending,
                TaskType::TxEvents,
                TaskMeta::new("Decoding transaction events"),
                true,
            )
            .await?;

        if decoded.result {
            self.refetch().await;
        }
        Ok(())
    }

    /// Boxed so event decoding can re-enter the fetch cycle
    fn refetch(self: &Arc<Self>) -> BoxFuture<'static, ()> {
        let store = Arc::clone(self);
        Box::pin(async move { store.fetch_transactions(false).await })
    }

    // ========================================================================
    // HISTORY EVENTS
    // ========================================================================

    pub async fn add_transaction_event(self: &Arc<Self>, event: &HistoryEvent) -> ActionStatus {
        let result = self.api.add_history_event(event).await;
        let status = ActionStatus::from_result(&result);
        if status.is_success() {
            self.fetch_transactions(false).await;
        }
        status
    }

    pub async fn edit_transaction_event(self: &Arc<Self>, event: &HistoryEvent) -> ActionStatus {
        let status = ActionStatus::from_flag(&self.api.edit_history_event(event).await);
        if status.is_success() {
            self.fetch_transactions(false).await;
        }
        status
    }

    pub async fn delete_transaction_event(self: &Arc<Self>, identifier: u64) -> ActionStatus {
        let status = ActionStatus::from_flag(&self.api.delete_history_events(&[identifier]).await);
        if status.is_success() {
            self.fetch_transactions(false).await;
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, Harness};
    use serde_json::json;

    async fn harness(backend: &Arc<FakeBackend>) -> Harness {
        let harness = Harness::new(backend.clone()).await;
        harness.accounts.fetch_accounts(None).await;
        harness
    }

    #[tokio::test]
    async fn test_empty_backend_settles_loaded() {
        let backend = FakeBackend::new();
        let h = harness(&backend).await;

        h.transactions.fetch_transactions(false).await;

        let collection = h.transactions.transactions();
        assert_eq!(collection.found, 0);
        assert!(collection.is_empty());
        assert_eq!(h.transactions.status(), Status::Loaded);
        assert_eq!(h.notifications.count(), 0);
        assert!(h.transactions.page().payload.unwrap().only_cache);
    }

    #[tokio::test]
    async fn test_second_plain_fetch_reads_cache_only() {
        let backend = FakeBackend::new();
        backend.set_accounts("ETH", &["0xA"]);
        let h = harness(&backend).await;

        h.transactions.fetch_transactions(false).await;
        assert_eq!(backend.tx_refreshes().len(), 1);
        let reads = backend.tx_cache_reads();

        h.transactions.fetch_transactions(false).await;
        assert_eq!(backend.tx_refreshes().len(), 1);
        assert_eq!(backend.tx_cache_reads(), reads + 1);

        h.transactions.fetch_transactions(true).await;
        assert_eq!(backend.tx_refreshes().len(), 2);
        assert_eq!(h.transactions.status(), Status::Loaded);
    }

    #[tokio::test]
    async fn test_changed_accounts_force_refresh() {
        let backend = FakeBackend::new();
        backend.set_accounts("ETH", &["0xA"]);
        let h = harness(&backend).await;
        h.transactions.fetch_transactions(false).await;

        backend.set_accounts("ETH", &["0xA", "0xB"]);
        h.accounts.fetch_accounts(None).await;
        h.transactions.fetch_transactions(false).await;

        assert_eq!(backend.tx_refreshes().len(), 3);
        assert_eq!(h.transactions.fetched_accounts().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_account_is_silent() {
        let backend = FakeBackend::new();
        backend.set_accounts("ETH", &["0xA", "0xB", "0xC"]);
        backend.cancel_tx_refresh("0xC");
        backend.fail_tx_refresh("0xB", "Etherscan rate limited");
        let h = harness(&backend).await;

        h.transactions.fetch_transactions(false).await;

        let account = |address: &str| EvmChainAddress {
            address: address.to_string(),
            evm_chain: "ethereum".to_string(),
        };
        assert_eq!(
            h.query_status.get(&account("0xA")).map(|s| s.step),
            Some(TxQueryStep::QueryingTransactionsFinished)
        );
        assert_eq!(h.query_status.get(&account("0xC")), None);

        let notifications = h.notifications.notifications();
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].message.contains("0xB"));
        assert!(notifications[0].message.contains("Etherscan rate limited"));
        assert_eq!(h.transactions.status(), Status::Loaded);
    }

    #[tokio::test]
    async fn test_update_payload_is_idempotent() {
        let backend = FakeBackend::new();
        let h = harness(&backend).await;
        h.transactions.fetch_transactions(false).await;
        let reads = backend.tx_cache_reads();

        let same = h.transactions.payload();
        assert!(!h.transactions.update_payload(same.clone()).await);
        assert_eq!(backend.tx_cache_reads(), reads);

        let next = TransactionRequestPayload {
            offset: 10,
            ..same
        };
        assert!(h.transactions.update_payload(next.clone()).await);
        assert_eq!(backend.tx_cache_reads(), reads + 1);
        assert_eq!(h.transactions.page().payload, Some(next));
    }

    fn undecoded_transaction(tx_hash: &str) -> serde_json::Value {
        json!({
            "tx_hash": tx_hash,
            "evm_chain": "ethereum",
            "timestamp": 1_650_000_000,
            "block_number": 14_000_000,
            "from_address": "0xA",
            "to_address": "0xB",
            "value": "1000",
            "gas": "21000",
            "gas_price": "30",
            "gas_used": "21000",
            "nonce": 4,
            "decoded_events": []
        })
    }

    async fn wait_for_event_requests(backend: &FakeBackend, count: usize) {
        for _ in 0..100 {
            if backend.event_requests().len() >= count {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_first_load_decodes_empty_events() {
        let backend = FakeBackend::new();
        backend.add_transaction(undecoded_transaction("0x01"));
        let h = harness(&backend).await;

        h.transactions.fetch_transactions(false).await;
        wait_for_event_requests(&backend, 1).await;

        let requests = backend.event_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].data[0].evm_chain, "ethereum");
        assert_eq!(requests[0].data[0].tx_hashes, Some(vec!["0x01".to_string()]));

        // same page again, nothing left to schedule
        h.transactions.fetch_transactions(false).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(backend.event_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_refreshed_transactions_are_read_back() {
        let backend = FakeBackend::new();
        backend.set_accounts("ETH", &["0xA"]);
        backend.add_transaction(undecoded_transaction("0x01"));
        let h = harness(&backend).await;

        h.transactions.fetch_transactions(false).await;
        let collection = h.transactions.transactions();
        assert_eq!(collection.found, 1);
        assert_eq!(collection.data[0].tx_hash, "0x01");
        wait_for_event_requests(&backend, 1).await;

        // a page change schedules decoding of the empty-events entry again
        let payload = TransactionRequestPayload {
            limit: 5,
            ..h.transactions.payload()
        };
        h.transactions.update_payload(payload).await;
        wait_for_event_requests(&backend, 2).await;

        let requests = backend.event_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].data[0].tx_hashes, Some(vec!["0x01".to_string()]));
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_query_backend_once() {
        let backend = FakeBackend::new();
        backend.set_accounts("ETH", &["0xA"]);
        let h = harness(&backend).await;
        h.transactions.fetch_transactions(false).await;
        assert_eq!(backend.tx_refreshes().len(), 1);

        tokio::join!(
            h.transactions.fetch_transactions(true),
            h.transactions.fetch_transactions(true)
        );

        assert_eq!(backend.tx_refreshes().len(), 2);
        assert_eq!(h.transactions.status(), Status::Loaded);
    }

    #[tokio::test]
    async fn test_cache_read_waits_for_running_refresh() {
        let backend = FakeBackend::new();
        backend.set_accounts("ETH", &["0xA"]);
        let h = harness(&backend).await;
        h.transactions.fetch_transactions(false).await;
        let reads = backend.tx_cache_reads();

        tokio::join!(
            h.transactions.fetch_transactions(true),
            h.transactions.fetch_transactions(false)
        );

        // refresh cycle reads twice, the queued cache read once
        assert_eq!(backend.tx_refreshes().len(), 2);
        assert_eq!(backend.tx_cache_reads(), reads + 3);
    }

    #[tokio::test]
    async fn test_failed_event_delete_skips_fetch() {
        let backend = FakeBackend::new();
        let h = harness(&backend).await;
        h.transactions.fetch_transactions(false).await;
        let reads = backend.tx_cache_reads();

        let status = h.transactions.delete_transaction_event(404).await;
        assert!(!status.success);
        assert_eq!(backend.tx_cache_reads(), reads);

        let status = h.transactions.delete_transaction_event(1).await;
        assert!(status.success);
        assert_eq!(backend.tx_cache_reads(), reads + 1);
    }
}
