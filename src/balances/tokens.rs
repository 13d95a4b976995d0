/// Token detection per chain and address
///
/// `BlockchainTokensStore` owns detection results for every chain.
/// `TokenDetection` is a handle bound to one chain (and optionally one
/// account) that decides which addresses still need a detection run.
use super::accounts::AccountsStore;
use super::chains::SupportedChains;
use super::types::{DetectedTokensByAddress, DetectedTokensInfo};
use crate::apis::TokensApi;
use crate::errors::{assert_that, FolioResult};
use crate::logger::{self, LogTag};
use crate::notifications::{NotificationPayload, NotificationStore};
use crate::observable::Observable;
use crate::tasks::{criteria, TaskMeta, TaskRegistry, TaskResult, TaskType};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub struct BlockchainTokensStore {
    api: Arc<dyn TokensApi>,
    tasks: Arc<TaskRegistry>,
    notifications: Arc<NotificationStore>,
    /// chain -> address -> detection result
    detected: Observable<BTreeMap<String, DetectedTokensByAddress>>,
}

impl BlockchainTokensStore {
    pub fn new(
        api: Arc<dyn TokensApi>,
        tasks: Arc<TaskRegistry>,
        notifications: Arc<NotificationStore>,
    ) -> Self {
        Self {
            api,
            tasks,
            notifications,
            detected: Observable::default(),
        }
    }

    /// Run detection for one address and merge the result
    ///
    /// Failures are reported as notifications; cancellations only logged.
    pub async fn fetch_detected(&self, chain: &str, address: &str) {
        if let Err(e) = self.detect(chain, address).await {
            if e.is_benign() {
                logger::debug(
                    LogTag::Tokens,
                    &format!("Token detection of {} on {} cancelled", address, chain),
                );
                return;
            }
            self.notifications.notify(NotificationPayload::error(
                "Token detection failed",
                format!("Failed to detect tokens of {} on {}: {}", address, chain, e),
            ));
        }
    }

    async fn detect(&self, chain: &str, address: &str) -> FolioResult<()> {
        let addresses = [address.to_string()];
        let pending = self.api.fetch_detected_tokens_task(chain, &addresses).await?;
        let meta = TaskMeta::new("Detecting tokens")
            .with_description(format!("Detecting tokens of {} on {}", address, chain))
            .with_field("chain", chain)
            .with_field("address", address);

        let detected: TaskResult<DetectedTokensByAddress> = self
            .tasks
            .await_task(pending, TaskType::FetchDetectedTokens, meta, false)
            .await?;
        logger::info(
            LogTag::Tokens,
            &format!(
                "Detected tokens of {} on {} ({} addresses)",
                address,
                chain,
                detected.result.len()
            ),
        );
        self.merge(chain, detected.result);
        Ok(())
    }

    /// Load previously detected tokens without starting a detection
    pub async fn load_detected(&self, chain: &str, addresses: &[String]) -> FolioResult<()> {
        let detected = self.api.get_detected_tokens(chain, addresses).await?;
        self.merge(chain, detected);
        Ok(())
    }

    fn merge(&self, chain: &str, detected: DetectedTokensByAddress) {
        self.detected.update(|chains| {
            chains.entry(chain.to_string()).or_default().extend(detected);
        });
    }

    pub fn detected_info(&self, chain: &str, address: &str) -> DetectedTokensInfo {
        self.detected.with(|chains| {
            chains
                .get(chain)
                .and_then(|by_address| by_address.get(address))
                .map(DetectedTokensInfo::from)
                .unwrap_or_default()
        })
    }

    /// Union of the detected tokens of every address on `chain`
    pub fn chain_info(&self, chain: &str) -> DetectedTokensInfo {
        self.detected.with(|chains| {
            let Some(by_address) = chains.get(chain) else {
                return DetectedTokensInfo::default();
            };
            let tokens: BTreeSet<String> = by_address
                .values()
                .filter_map(|d| d.tokens.as_ref())
                .flatten()
                .cloned()
                .collect();
            let timestamp = by_address
                .values()
                .filter_map(|d| d.last_update_timestamp)
                .max();
            DetectedTokensInfo {
                total: tokens.len(),
                tokens: tokens.into_iter().collect(),
                timestamp,
            }
        })
    }

    pub fn subscribe(
        &self,
    ) -> tokio::sync::watch::Receiver<BTreeMap<String, DetectedTokensByAddress>> {
        self.detected.subscribe()
    }
}

/// Detection handle for one chain, optionally pinned to one account
pub struct TokenDetection {
    chain: String,
    account_address: Option<String>,
    tasks: Arc<TaskRegistry>,
    tokens: Arc<BlockchainTokensStore>,
    chains: Arc<SupportedChains>,
    accounts: Arc<AccountsStore>,
    parallelism: usize,
}

impl TokenDetection {
    pub fn new(
        chain: impl Into<String>,
        account_address: Option<String>,
        tasks: Arc<TaskRegistry>,
        tokens: Arc<BlockchainTokensStore>,
        chains: Arc<SupportedChains>,
        accounts: Arc<AccountsStore>,
        parallelism: usize,
    ) -> Self {
        Self {
            chain: chain.into(),
            account_address,
            tasks,
            tokens,
            chains,
            accounts,
            parallelism: parallelism.max(1),
        }
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Detection running for `address`, or for any address of the chain
    pub fn is_detecting_task_running(&self, address: Option<&str>) -> bool {
        let mut matching = criteria([("chain", self.chain.as_str())]);
        if let Some(address) = address {
            matching.insert("address".to_string(), address.to_string());
        }
        self.tasks
            .is_running(TaskType::FetchDetectedTokens, &matching)
    }

    /// Detection running for the bound account, or the whole chain when unbound
    pub fn detecting_tokens(&self) -> bool {
        self.is_detecting_task_running(self.account_address.as_deref())
    }

    pub fn detected_tokens(&self) -> DetectedTokensInfo {
        match &self.account_address {
            Some(address) => self.tokens.detected_info(&self.chain, address),
            None => self.tokens.chain_info(&self.chain),
        }
    }

    pub async fn fetch_detected_tokens(&self, address: &str) -> FolioResult<()> {
        assert_that(
            self.chains.supports_transactions(&self.chain),
            &format!("{} does not support token detection", self.chain),
        )?;
        self.tokens.fetch_detected(&self.chain, address).await;
        Ok(())
    }

    /// Detect tokens of the bound account, or of `addresses` when unbound
    ///
    /// Addresses with a detection already running are skipped. At most
    /// `parallelism` detections run at once.
    pub async fn detect_tokens(&self, addresses: &[String]) -> FolioResult<()> {
        let requested: Vec<String> = match &self.account_address {
            Some(address) => vec![address.clone()],
            None => addresses.to_vec(),
        };
        assert_that(
            !requested.is_empty(),
            "token detection needs an account address or a list of addresses",
        )?;

        let pending: Vec<String> = requested
            .into_iter()
            .filter(|address| !self.is_detecting_task_running(Some(address)))
            .collect();
        if pending.is_empty() {
            logger::debug(
                LogTag::Tokens,
                &format!("Detection already running for every address on {}", self.chain),
            );
            return Ok(());
        }

        let results: Vec<FolioResult<()>> = stream::iter(pending)
            .map(|address| async move { self.fetch_detected_tokens(&address).await })
            .buffer_unordered(self.parallelism)
            .collect()
            .await;

        results.into_iter().collect()
    }

    pub async fn detect_tokens_of_all_addresses(&self) -> FolioResult<()> {
        let addresses = self.accounts.addresses(&self.chain);
        if addresses.is_empty() {
            return Ok(());
        }
        self.detect_tokens(&addresses).await
    }
}
