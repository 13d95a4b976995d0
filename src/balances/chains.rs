/// Supported chains as reported by the backend
use super::types::ChainInfo;
use crate::apis::ChainsApi;
use crate::errors::FolioResult;
use crate::logger::{self, LogTag};
use crate::observable::Observable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Chain excluded from transaction queries
const NO_TX_CHAIN: &str = "AVAX";

pub struct SupportedChains {
    api: Arc<dyn ChainsApi>,
    chains: Observable<Vec<ChainInfo>>,
    loaded: AtomicBool,
}

impl SupportedChains {
    pub fn new(api: Arc<dyn ChainsApi>) -> Self {
        Self {
            api,
            chains: Observable::default(),
            loaded: AtomicBool::new(false),
        }
    }

    pub async fn load(&self) -> FolioResult<()> {
        let chains = self.api.supported_chains().await?;
        logger::debug(
            LogTag::Accounts,
            &format!("Loaded {} supported chains", chains.len()),
        );
        self.chains.set(chains);
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Load once; a failure leaves the list empty and is retried next call
    pub async fn ensure_loaded(&self) {
        if self.loaded.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.load().await {
            logger::warning(
                LogTag::Accounts,
                &format!("Failed to load supported chains: {}", e),
            );
        }
    }

    pub fn supported_chains(&self) -> Vec<ChainInfo> {
        self.chains.get()
    }

    pub fn evm_chains_data(&self) -> Vec<ChainInfo> {
        self.chains
            .with(|chains| chains.iter().filter(|c| c.is_evm()).cloned().collect())
    }

    /// EVM chains whose transactions can be queried
    pub fn tx_evm_chains(&self) -> Vec<ChainInfo> {
        self.evm_chains_data()
            .into_iter()
            .filter(|c| c.id != NO_TX_CHAIN)
            .collect()
    }

    pub fn tx_evm_chain_names(&self) -> Vec<String> {
        self.tx_evm_chains()
            .into_iter()
            .filter_map(|c| c.evm_chain_name)
            .collect()
    }

    pub fn evm_chains(&self) -> Vec<String> {
        self.evm_chains_data().into_iter().map(|c| c.id).collect()
    }

    pub fn evm_chain_names(&self) -> Vec<String> {
        self.evm_chains_data()
            .into_iter()
            .filter_map(|c| c.evm_chain_name)
            .collect()
    }

    pub fn is_evm(&self, chain: &str) -> bool {
        self.chains
            .with(|chains| chains.iter().any(|c| c.is_evm() && c.id == chain))
    }

    pub fn supports_transactions(&self, chain: &str) -> bool {
        self.tx_evm_chains().iter().any(|c| c.id == chain)
    }

    pub fn evm_chain_name(&self, chain: &str) -> Option<String> {
        self.chains.with(|chains| {
            chains
                .iter()
                .find(|c| c.is_evm() && c.id == chain)
                .and_then(|c| c.evm_chain_name.clone())
        })
    }

    pub fn chain_info(&self, chain: &str) -> Option<ChainInfo> {
        self.chains
            .with(|chains| chains.iter().find(|c| c.id == chain).cloned())
    }

    /// Native asset of an EVM chain, the chain id itself otherwise
    pub fn native_asset(&self, chain: &str) -> String {
        self.chains
            .with(|chains| {
                chains
                    .iter()
                    .find(|c| c.is_evm() && c.id == chain)
                    .and_then(|c| c.native_asset.clone())
            })
            .unwrap_or_else(|| chain.to_string())
    }
}
