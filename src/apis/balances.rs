/// Chains, accounts, token detection and asset lookup endpoints
use super::client::{ApiClient, Request};
use super::traits::{AccountsApi, ChainsApi, TokensApi};
use super::wire::{VALID_STATUS, VALID_WITH_EXTERNAL_SERVICE};
use crate::balances::{ChainInfo, DetectedTokensByAddress, GeneralAccount};
use crate::errors::{FolioError, FolioResult};
use crate::history::EvmChainAddress;
use crate::tasks::PendingTask;
use async_trait::async_trait;
use futures::future::AbortRegistration;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AssetInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub evm_chain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AssetMap {
    pub assets: BTreeMap<String, AssetInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetSearchPayload {
    pub value: String,
    pub limit: u32,
    pub search_nfts: bool,
}

impl AssetSearchPayload {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            limit: 25,
            search_nfts: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AssetWithId {
    pub identifier: String,
    #[serde(flatten)]
    pub info: AssetInfo,
}

/// Result of an `erc20_details` task
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Erc20Details {
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

impl ApiClient {
    pub async fn asset_mapping(&self, identifiers: &[String]) -> FolioResult<AssetMap> {
        self.send(
            Request::post("assets/mappings")
                .json(json!({ "identifiers": identifiers }))
                .allow(VALID_STATUS),
        )
        .await
    }

    /// Fuzzy asset search, abortable through `abort`
    pub async fn asset_search(
        &self,
        payload: &AssetSearchPayload,
        abort: Option<AbortRegistration>,
    ) -> FolioResult<Vec<AssetWithId>> {
        let body =
            serde_json::to_value(payload).map_err(|e| FolioError::validation("asset search", e))?;
        self.send_abortable(
            Request::post("assets/search/levenshtein")
                .json(body)
                .allow(VALID_STATUS),
            abort,
        )
        .await
    }

    pub async fn erc20_details(&self, token: &EvmChainAddress) -> FolioResult<PendingTask> {
        self.send(
            Request::get("blockchains/evm/erc20details")
                .query(json!({
                    "async_query": true,
                    "address": token.address,
                    "evm_chain": token.evm_chain,
                }))
                .allow(&[400]),
        )
        .await
    }
}

#[async_trait]
impl TokensApi for ApiClient {
    async fn fetch_detected_tokens_task(
        &self,
        chain: &str,
        addresses: &[String],
    ) -> FolioResult<PendingTask> {
        let path = format!("blockchains/{}/tokens/detect", chain);
        self.send(
            Request::post(&path)
                .json(json!({
                    "async_query": true,
                    "only_cache": false,
                    "addresses": addresses,
                }))
                .allow(VALID_WITH_EXTERNAL_SERVICE),
        )
        .await
    }

    async fn get_detected_tokens(
        &self,
        chain: &str,
        addresses: &[String],
    ) -> FolioResult<DetectedTokensByAddress> {
        let path = format!("blockchains/{}/tokens/detect", chain);
        self.send(
            Request::post(&path)
                .json(json!({
                    "async_query": false,
                    "only_cache": true,
                    "addresses": addresses,
                }))
                .allow(VALID_WITH_EXTERNAL_SERVICE),
        )
        .await
    }
}

#[async_trait]
impl AccountsApi for ApiClient {
    async fn accounts(&self, chain: &str) -> FolioResult<Vec<GeneralAccount>> {
        let path = format!("blockchains/{}/accounts", chain);
        self.send(Request::get(&path).allow(VALID_STATUS)).await
    }
}

#[async_trait]
impl ChainsApi for ApiClient {
    async fn supported_chains(&self) -> FolioResult<Vec<ChainInfo>> {
        self.send(Request::get("blockchains/supported")).await
    }
}
