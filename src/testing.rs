//! In-memory backend serving every endpoint group, for store tests
//!
//! Async endpoints allocate a task id and script its outcome on the embedded
//! `ScriptedTaskBackend`, so stores go through the real `TaskRegistry`.

use crate::apis::{
    AccountsApi, ChainsApi, DefiApi, LedgerActionsApi, LedgerActionsResponse, TokensApi,
    TransactionsApi, TransactionsResponse,
};
use crate::balances::{ChainInfo, DetectedTokensByAddress, GeneralAccount};
use crate::config::Config;
use crate::defi::{Module, ProtocolMetadata};
use crate::errors::{FolioError, FolioResult};
use crate::history::{
    EvmChainAddress, HistoryEvent, LedgerAction, LedgerActionRequestPayload, NewLedgerAction,
    TransactionEventRequestPayload, TransactionRequestPayload,
};
use crate::session::{Backends, Session};
use crate::tasks::testing::ScriptedTaskBackend;
use crate::tasks::{PendingTask, TaskBackend, TaskId, TaskIdList, TaskOutcome};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

enum Scripted {
    Complete(Value),
    Fail(String),
    Cancel,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Vec<String>>,
    failing_accounts: HashSet<String>,
    transactions: Vec<Value>,
    tx_refreshes: Vec<EvmChainAddress>,
    tx_failures: HashMap<String, String>,
    tx_cancellations: HashSet<String>,
    event_requests: Vec<TransactionEventRequestPayload>,
    ledger_actions: Vec<LedgerAction>,
    ledger_refreshes: Vec<Option<String>>,
    ledger_failure: Option<String>,
    module_requests: Vec<Module>,
    failing_modules: HashSet<Module>,
    detection_requests: Vec<(String, Vec<String>)>,
}

pub struct FakeBackend {
    tasks: Arc<ScriptedTaskBackend>,
    state: Mutex<State>,
    next_task: AtomicU64,
    tx_cache_reads: AtomicUsize,
    ledger_cache_reads: AtomicUsize,
}

/// Decimal literal for amount assertions
pub fn dec(value: &str) -> BigDecimal {
    value.parse().unwrap()
}

fn empty_collection() -> Value {
    json!({"entries": [], "entries_found": 0, "entries_limit": 0, "entries_total": 0})
}

fn collection(entries: Vec<Value>, limit: u32) -> Value {
    let found = entries.len();
    json!({
        "entries": entries.into_iter().map(|entry| json!({"entry": entry})).collect::<Vec<_>>(),
        "entries_found": found,
        "entries_limit": limit,
        "entries_total": found
    })
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tasks: Arc::new(ScriptedTaskBackend::new()),
            state: Mutex::new(State::default()),
            next_task: AtomicU64::new(1),
            tx_cache_reads: AtomicUsize::new(0),
            ledger_cache_reads: AtomicUsize::new(0),
        })
    }

    pub fn task_backend(&self) -> Arc<ScriptedTaskBackend> {
        self.tasks.clone()
    }

    fn start_task(&self, outcome: Scripted) -> PendingTask {
        let id = self.next_task.fetch_add(1, Ordering::SeqCst);
        match outcome {
            Scripted::Complete(result) => self.tasks.complete(id, result),
            Scripted::Fail(message) => self.tasks.fail(id, &message),
            Scripted::Cancel => self.tasks.cancel(id, "superseded"),
        }
        PendingTask { task_id: TaskId(id) }
    }

    // accounts

    pub fn set_accounts(&self, chain: &str, addresses: &[&str]) {
        self.state.lock().accounts.insert(
            chain.to_string(),
            addresses.iter().map(|a| a.to_string()).collect(),
        );
    }

    pub fn fail_accounts(&self, chain: &str) {
        self.state.lock().failing_accounts.insert(chain.to_string());
    }

    // transactions

    pub fn add_transaction(&self, transaction: Value) {
        self.state.lock().transactions.push(transaction);
    }

    pub fn fail_tx_refresh(&self, address: &str, message: &str) {
        self.state
            .lock()
            .tx_failures
            .insert(address.to_string(), message.to_string());
    }

    pub fn cancel_tx_refresh(&self, address: &str) {
        self.state.lock().tx_cancellations.insert(address.to_string());
    }

    pub fn tx_refreshes(&self) -> Vec<EvmChainAddress> {
        self.state.lock().tx_refreshes.clone()
    }

    pub fn tx_cache_reads(&self) -> usize {
        self.tx_cache_reads.load(Ordering::SeqCst)
    }

    pub fn event_requests(&self) -> Vec<TransactionEventRequestPayload> {
        self.state.lock().event_requests.clone()
    }

    // ledger actions

    pub fn fail_ledger_refresh(&self, message: &str) {
        self.state.lock().ledger_failure = Some(message.to_string());
    }

    pub fn ledger_refreshes(&self) -> Vec<Option<String>> {
        self.state.lock().ledger_refreshes.clone()
    }

    pub fn ledger_cache_reads(&self) -> usize {
        self.ledger_cache_reads.load(Ordering::SeqCst)
    }

    // defi

    pub fn fail_module(&self, module: Module) {
        self.state.lock().failing_modules.insert(module);
    }

    pub fn module_requests(&self) -> Vec<Module> {
        self.state.lock().module_requests.clone()
    }

    // tokens

    pub fn detection_requests(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().detection_requests.clone()
    }

    fn ledger_collection(&self, limit: u32) -> FolioResult<LedgerActionsResponse> {
        let entries = self
            .state
            .lock()
            .ledger_actions
            .iter()
            .map(|action| serde_json::to_value(action).unwrap())
            .collect();
        Ok(serde_json::from_value(collection(entries, limit)).unwrap())
    }
}

#[async_trait]
impl TaskBackend for FakeBackend {
    async fn task_ids(&self) -> FolioResult<TaskIdList> {
        self.tasks.task_ids().await
    }

    async fn task_outcome(&self, task_id: TaskId) -> FolioResult<TaskOutcome> {
        self.tasks.task_outcome(task_id).await
    }
}

#[async_trait]
impl ChainsApi for FakeBackend {
    async fn supported_chains(&self) -> FolioResult<Vec<ChainInfo>> {
        Ok(serde_json::from_value(json!([
            {"id": "ETH", "name": "Ethereum", "type": "evm", "evm_chain_name": "ethereum", "native_asset": "ETH"},
            {"id": "OPTIMISM", "name": "Optimism", "type": "evm", "evm_chain_name": "optimism", "native_asset": "ETH"},
            {"id": "AVAX", "name": "Avalanche", "type": "evm", "evm_chain_name": "avalanche", "native_asset": "AVAX"},
            {"id": "BTC", "name": "Bitcoin", "type": "bitcoin"}
        ]))
        .unwrap())
    }
}

#[async_trait]
impl AccountsApi for FakeBackend {
    async fn accounts(&self, chain: &str) -> FolioResult<Vec<GeneralAccount>> {
        let state = self.state.lock();
        if state.failing_accounts.contains(chain) {
            return Err(FolioError::Network("connection reset".to_string()));
        }
        Ok(state
            .accounts
            .get(chain)
            .map(|addresses| {
                addresses
                    .iter()
                    .map(|address| GeneralAccount {
                        address: address.clone(),
                        label: None,
                        tags: None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl TransactionsApi for FakeBackend {
    async fn fetch_transactions(
        &self,
        payload: &TransactionRequestPayload,
    ) -> FolioResult<TransactionsResponse> {
        self.tx_cache_reads.fetch_add(1, Ordering::SeqCst);
        let entries = self.state.lock().transactions.clone();
        Ok(serde_json::from_value(collection(entries, payload.limit)).unwrap())
    }

    async fn fetch_transactions_task(
        &self,
        payload: &TransactionRequestPayload,
    ) -> FolioResult<PendingTask> {
        let outcome = {
            let mut state = self.state.lock();
            state.tx_refreshes.extend(payload.accounts.iter().cloned());
            let address = payload
                .accounts
                .first()
                .map(|account| account.address.clone())
                .unwrap_or_default();
            if state.tx_cancellations.contains(&address) {
                Scripted::Cancel
            } else if let Some(message) = state.tx_failures.get(&address) {
                Scripted::Fail(message.clone())
            } else {
                Scripted::Complete(empty_collection())
            }
        };
        Ok(self.start_task(outcome))
    }

    async fn fetch_transaction_events(
        &self,
        payload: &TransactionEventRequestPayload,
    ) -> FolioResult<PendingTask> {
        self.state.lock().event_requests.push(payload.clone());
        Ok(self.start_task(Scripted::Complete(json!(false))))
    }

    async fn redecode_missing_events(&self, _evm_chains: &[String]) -> FolioResult<PendingTask> {
        Ok(self.start_task(Scripted::Complete(json!(false))))
    }

    async fn add_history_event(&self, _event: &HistoryEvent) -> FolioResult<u64> {
        Ok(1)
    }

    async fn edit_history_event(&self, _event: &HistoryEvent) -> FolioResult<bool> {
        Ok(true)
    }

    async fn delete_history_events(&self, identifiers: &[u64]) -> FolioResult<bool> {
        Ok(!identifiers.contains(&404))
    }
}

#[async_trait]
impl LedgerActionsApi for FakeBackend {
    async fn get_ledger_actions(
        &self,
        payload: &LedgerActionRequestPayload,
    ) -> FolioResult<LedgerActionsResponse> {
        self.ledger_cache_reads.fetch_add(1, Ordering::SeqCst);
        self.ledger_collection(payload.limit)
    }

    async fn get_ledger_actions_task(
        &self,
        payload: &LedgerActionRequestPayload,
    ) -> FolioResult<PendingTask> {
        let outcome = {
            let mut state = self.state.lock();
            state.ledger_refreshes.push(payload.location.clone());
            match &state.ledger_failure {
                Some(message) => Scripted::Fail(message.clone()),
                None => Scripted::Complete(empty_collection()),
            }
        };
        Ok(self.start_task(outcome))
    }

    async fn add_ledger_action(&self, action: &NewLedgerAction) -> FolioResult<u64> {
        let mut state = self.state.lock();
        let identifier = state.ledger_actions.len() as u64 + 1;
        state.ledger_actions.push(LedgerAction {
            identifier,
            action: action.clone(),
        });
        Ok(identifier)
    }

    async fn edit_ledger_action(
        &self,
        action: &LedgerAction,
    ) -> FolioResult<LedgerActionsResponse> {
        {
            let mut state = self.state.lock();
            match state
                .ledger_actions
                .iter_mut()
                .find(|existing| existing.identifier == action.identifier)
            {
                Some(existing) => *existing = action.clone(),
                None => {
                    return Err(FolioError::Http {
                        status: 409,
                        message: format!("No ledger action with id {}", action.identifier),
                    })
                }
            }
        }
        self.ledger_collection(0)
    }

    async fn delete_ledger_actions(&self, identifiers: &[u64]) -> FolioResult<bool> {
        self.state
            .lock()
            .ledger_actions
            .retain(|action| !identifiers.contains(&action.identifier));
        Ok(true)
    }
}

#[async_trait]
impl DefiApi for FakeBackend {
    async fn fetch_all_defi(&self) -> FolioResult<PendingTask> {
        let position = |name: &str, token: &str, usd: &str| {
            json!({
                "protocol": {"name": name},
                "balance_type": "Asset",
                "base_balance": {
                    "token_address": format!("0x{}", token),
                    "token_name": token,
                    "token_symbol": token,
                    "balance": {"amount": "1", "usd_value": usd}
                }
            })
        };
        Ok(self.start_task(Scripted::Complete(json!({
            "0xA": [position("Aave", "aDAI", "80"), position("Curve", "3Crv", "100")]
        }))))
    }

    async fn fetch_module_balances(&self, module: Module) -> FolioResult<PendingTask> {
        let outcome = {
            let mut state = self.state.lock();
            state.module_requests.push(module);
            if state.failing_modules.contains(&module) {
                Scripted::Fail(format!("{} query failed", module))
            } else if matches!(module, Module::Aave | Module::Compound) {
                let at = |usd: &str| json!([{"asset": "DAI", "balance": {"amount": usd, "usd_value": usd}}]);
                Scripted::Complete(json!({
                    "0xA": {"deposits": at("50"), "collateral": at("10"), "debt": at("5")}
                }))
            } else {
                Scripted::Complete(json!({}))
            }
        };
        Ok(self.start_task(outcome))
    }

    async fn fetch_defi_metadata(&self) -> FolioResult<Vec<ProtocolMetadata>> {
        let item = |identifier: &str, name: &str| ProtocolMetadata {
            identifier: identifier.to_string(),
            name: name.to_string(),
            icon: None,
        };
        Ok(vec![
            item("aave", "Aave"),
            item("compound", "Compound"),
            item("yearn_finance_vaults", "yearn.finance"),
            item("liquity", "Liquity"),
            item("curve_co", "Curve & Co"),
        ])
    }
}

#[async_trait]
impl TokensApi for FakeBackend {
    async fn fetch_detected_tokens_task(
        &self,
        chain: &str,
        addresses: &[String],
    ) -> FolioResult<PendingTask> {
        self.state
            .lock()
            .detection_requests
            .push((chain.to_string(), addresses.to_vec()));
        let detected: BTreeMap<&String, Value> = addresses
            .iter()
            .map(|address| {
                (
                    address,
                    json!({"tokens": ["DAI", "USDC"], "last_update_timestamp": 1_700_000_000}),
                )
            })
            .collect();
        Ok(self.start_task(Scripted::Complete(json!(detected))))
    }

    async fn get_detected_tokens(
        &self,
        _chain: &str,
        _addresses: &[String],
    ) -> FolioResult<DetectedTokensByAddress> {
        Ok(DetectedTokensByAddress::new())
    }
}

/// Session wired to a `FakeBackend` with chains already loaded
pub struct Harness(Session);

impl Harness {
    pub async fn new(backend: Arc<FakeBackend>) -> Self {
        let mut config = Config::default();
        config.tasks.poll_interval_ms = 5;
        let session = Session::with_backends(&config, Backends::all(backend));
        session.chains.ensure_loaded().await;
        Harness(session)
    }
}

impl Deref for Harness {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.0
    }
}
