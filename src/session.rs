/// Composition root wiring every store to its endpoints
use crate::apis::{
    AccountsApi, ApiClient, ChainsApi, DefiApi, LedgerActionsApi, TokensApi, TransactionsApi,
};
use crate::balances::{AccountsStore, BlockchainTokensStore, SupportedChains, TokenDetection};
use crate::cache::BlockieCache;
use crate::config::Config;
use crate::defi::{DefiMetadata, DefiStore};
use crate::errors::FolioResult;
use crate::history::{LedgerActionsStore, PurgeStore, TransactionStore, TxQueryStatusStore};
use crate::logger::{self, LogTag};
use crate::notifications::NotificationStore;
use crate::status::StatusStore;
use crate::tasks::{TaskBackend, TaskRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shared services every store is built with
#[derive(Clone)]
pub struct StoreContext {
    pub tasks: Arc<TaskRegistry>,
    pub statuses: Arc<StatusStore>,
    pub notifications: Arc<NotificationStore>,
}

/// Endpoint implementations the stores talk to
#[derive(Clone)]
pub struct Backends {
    pub transactions: Arc<dyn TransactionsApi>,
    pub ledger_actions: Arc<dyn LedgerActionsApi>,
    pub defi: Arc<dyn DefiApi>,
    pub tokens: Arc<dyn TokensApi>,
    pub accounts: Arc<dyn AccountsApi>,
    pub chains: Arc<dyn ChainsApi>,
    pub tasks: Arc<dyn TaskBackend>,
}

impl Backends {
    /// Every endpoint group served by the same implementation
    pub fn all<B>(backend: Arc<B>) -> Self
    where
        B: TransactionsApi
            + LedgerActionsApi
            + DefiApi
            + TokensApi
            + AccountsApi
            + ChainsApi
            + TaskBackend
            + 'static,
    {
        Self {
            transactions: backend.clone(),
            ledger_actions: backend.clone(),
            defi: backend.clone(),
            tokens: backend.clone(),
            accounts: backend.clone(),
            chains: backend.clone(),
            tasks: backend,
        }
    }
}

pub struct Session {
    pub config: Config,
    /// Set when talking to a real backend
    pub client: Option<Arc<ApiClient>>,
    pub tasks: Arc<TaskRegistry>,
    pub statuses: Arc<StatusStore>,
    pub notifications: Arc<NotificationStore>,
    pub chains: Arc<SupportedChains>,
    pub accounts: Arc<AccountsStore>,
    pub tokens: Arc<BlockchainTokensStore>,
    pub query_status: Arc<TxQueryStatusStore>,
    pub transactions: Arc<TransactionStore>,
    pub ledger_actions: Arc<LedgerActionsStore>,
    pub purge: PurgeStore,
    pub defi_metadata: Arc<DefiMetadata>,
    pub defi: DefiStore,
    pub blockies: BlockieCache,
    items_per_page: watch::Sender<usize>,
}

impl Session {
    /// Session against the backend at `config.api.base_url`
    pub fn new(config: &Config) -> FolioResult<Self> {
        let client = Arc::new(ApiClient::new(&config.api)?);
        logger::info(
            LogTag::System,
            &format!("Using backend at {}", client.base_url()),
        );
        let mut session = Self::with_backends(config, Backends::all(client.clone()));
        session.client = Some(client);
        Ok(session)
    }

    pub fn with_backends(config: &Config, backends: Backends) -> Self {
        let tasks = TaskRegistry::new(
            backends.tasks,
            Duration::from_millis(config.tasks.poll_interval_ms),
        );
        let statuses = Arc::new(StatusStore::new());
        let notifications = Arc::new(NotificationStore::new());
        let context = StoreContext {
            tasks: tasks.clone(),
            statuses: statuses.clone(),
            notifications: notifications.clone(),
        };

        let chains = Arc::new(SupportedChains::new(backends.chains));
        let accounts = Arc::new(AccountsStore::new(
            backends.accounts,
            chains.clone(),
            notifications.clone(),
        ));
        let tokens = Arc::new(BlockchainTokensStore::new(
            backends.tokens,
            tasks.clone(),
            notifications.clone(),
        ));

        let query_status = Arc::new(TxQueryStatusStore::new());
        let transactions = TransactionStore::new(
            backends.transactions,
            &context,
            query_status.clone(),
            chains.clone(),
            accounts.clone(),
            config.history.default_limit,
        );
        let ledger_actions = LedgerActionsStore::new(
            backends.ledger_actions,
            &context,
            config.history.default_limit,
        );
        let purge = PurgeStore::new(
            statuses.clone(),
            ledger_actions.clone(),
            transactions.clone(),
        );

        let defi_metadata = Arc::new(DefiMetadata::new(backends.defi.clone()));
        let defi = DefiStore::new(backends.defi, &context, defi_metadata.clone());

        let blockies = BlockieCache::new(
            config.cache.blockie_min_size,
            config.cache.items_per_page,
        );
        let (items_per_page, _) = watch::channel(config.cache.items_per_page);

        Self {
            config: config.clone(),
            client: None,
            tasks,
            statuses,
            notifications,
            chains,
            accounts,
            tokens,
            query_status,
            transactions,
            ledger_actions,
            purge,
            defi_metadata,
            defi,
            blockies,
            items_per_page,
        }
    }

    pub fn context(&self) -> StoreContext {
        StoreContext {
            tasks: self.tasks.clone(),
            statuses: self.statuses.clone(),
            notifications: self.notifications.clone(),
        }
    }

    /// Load chains, accounts and protocol metadata
    pub async fn initialize(&self) {
        self.chains.ensure_loaded().await;
        self.accounts.fetch_accounts(None).await;
        self.defi_metadata.ensure_loaded().await;
        logger::info(
            LogTag::System,
            &format!(
                "Session ready: {} chains, {} accounts",
                self.chains.supported_chains().len(),
                self.accounts.accounts().len()
            ),
        );
    }

    /// Detection handle for `chain`, optionally pinned to one account
    pub fn token_detection(&self, chain: &str, account_address: Option<String>) -> TokenDetection {
        TokenDetection::new(
            chain,
            account_address,
            self.tasks.clone(),
            self.tokens.clone(),
            self.chains.clone(),
            self.accounts.clone(),
            self.config.tokens.detection_parallelism,
        )
    }

    /// Keep the blockie cache sized to the table page size
    pub fn follow_items_per_page(&self) -> JoinHandle<()> {
        self.blockies
            .follow_items_per_page(self.items_per_page.subscribe())
    }

    pub fn set_items_per_page(&self, items_per_page: usize) {
        self.items_per_page.send_replace(items_per_page);
    }
}
