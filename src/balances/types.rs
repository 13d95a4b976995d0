/// Balance, chain and account types
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Add;

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Balance {
    #[serde(deserialize_with = "crate::apis::wire::amount")]
    pub amount: BigDecimal,
    #[serde(deserialize_with = "crate::apis::wire::amount")]
    pub usd_value: BigDecimal,
}

impl Add<&Balance> for &Balance {
    type Output = Balance;

    fn add(self, other: &Balance) -> Balance {
        Balance {
            amount: &self.amount + &other.amount,
            usd_value: &self.usd_value + &other.usd_value,
        }
    }
}

/// Entry of the backend's supported chains list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChainInfo {
    /// Chain identifier, e.g. `ETH`
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub chain_type: String,
    #[serde(default)]
    pub evm_chain_name: Option<String>,
    #[serde(default)]
    pub native_asset: Option<String>,
}

impl ChainInfo {
    pub fn is_evm(&self) -> bool {
        self.chain_type == "evm"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GeneralAccount {
    pub address: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Address on a given chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BlockchainAccount {
    pub chain: String,
    pub address: String,
}

/// Detection result for one address
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct DetectedTokens {
    #[serde(default)]
    pub tokens: Option<Vec<String>>,
    #[serde(default)]
    pub last_update_timestamp: Option<i64>,
}

/// address -> detection result
pub type DetectedTokensByAddress = BTreeMap<String, DetectedTokens>;

/// Summary of detected tokens as exposed to callers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DetectedTokensInfo {
    pub tokens: Vec<String>,
    pub total: usize,
    pub timestamp: Option<i64>,
}

impl From<&DetectedTokens> for DetectedTokensInfo {
    fn from(detected: &DetectedTokens) -> Self {
        let tokens = detected.tokens.clone().unwrap_or_default();
        Self {
            total: tokens.len(),
            tokens,
            timestamp: detected.last_update_timestamp,
        }
    }
}
