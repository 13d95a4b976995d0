/// History entities and request payloads
use super::collection::{Collection, Entry};
use crate::balances::Balance;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// REQUEST PAYLOADS
// ============================================================================

/// Account scope of a transaction query
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EvmChainAddress {
    pub address: String,
    pub evm_chain: String,
}

/// Filter/sort/pagination parameters of the transactions collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRequestPayload {
    pub limit: u32,
    pub offset: u32,
    pub ascending: Vec<bool>,
    /// Client-side attribute names, converted to snake_case on the wire
    pub order_by_attributes: Vec<String>,
    pub only_cache: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accounts: Vec<EvmChainAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
}

impl TransactionRequestPayload {
    /// First page sorted by newest first
    pub fn first_page(limit: u32) -> Self {
        Self {
            limit,
            offset: 0,
            ascending: vec![false],
            order_by_attributes: vec!["timestamp".to_string()],
            only_cache: true,
            accounts: Vec::new(),
            from_timestamp: None,
            to_timestamp: None,
            asset: None,
            protocols: Vec::new(),
        }
    }

    /// Backend refresh of a single account
    pub fn refresh_account(account: EvmChainAddress) -> Self {
        Self {
            only_cache: false,
            accounts: vec![account],
            ..Self::first_page(0)
        }
    }
}

/// Filter/sort/pagination parameters of the ledger actions collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerActionRequestPayload {
    pub limit: u32,
    pub offset: u32,
    pub ascending: Vec<bool>,
    pub order_by_attributes: Vec<String>,
    pub only_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_timestamp: Option<i64>,
}

impl LedgerActionRequestPayload {
    pub fn first_page(limit: u32) -> Self {
        Self {
            limit,
            offset: 0,
            ascending: vec![false],
            order_by_attributes: vec!["timestamp".to_string()],
            only_cache: true,
            location: None,
            asset: None,
            action: None,
            from_timestamp: None,
            to_timestamp: None,
        }
    }

    /// Backend refresh, optionally limited to one location
    pub fn refresh(location: Option<String>) -> Self {
        Self {
            only_cache: false,
            location,
            ..Self::first_page(1)
        }
    }
}

/// Per-chain (optionally per-hash) scope of an event decoding request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxHashesByChain {
    pub evm_chain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hashes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionEventRequestPayload {
    pub data: Vec<TxHashesByChain>,
    pub ignore_cache: bool,
}

// ============================================================================
// ENTITIES
// ============================================================================

/// Decoded history event attached to a transaction
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HistoryEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<u64>,
    pub event_identifier: String,
    pub sequence_index: u32,
    pub timestamp: i64,
    pub location: String,
    pub event_type: String,
    pub event_subtype: String,
    pub asset: String,
    pub balance: Balance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EvmTransaction {
    pub tx_hash: String,
    pub evm_chain: String,
    pub timestamp: i64,
    pub block_number: u64,
    pub from_address: String,
    #[serde(default)]
    pub to_address: Option<String>,
    pub value: String,
    pub gas: String,
    pub gas_price: String,
    pub gas_used: String,
    #[serde(default)]
    pub input_data: String,
    pub nonce: u64,
    /// `None` when decoding was never attempted, empty when it found nothing
    #[serde(default)]
    pub decoded_events: Option<Vec<HistoryEvent>>,
}

pub type TransactionEntry = Entry<EvmTransaction>;
pub type TransactionCollection = Collection<TransactionEntry>;

/// Ledger action fields without the backend identifier
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NewLedgerAction {
    pub timestamp: i64,
    pub action_type: String,
    pub location: String,
    #[serde(deserialize_with = "crate::apis::wire::amount")]
    pub amount: BigDecimal,
    pub asset: String,
    #[serde(
        default,
        deserialize_with = "crate::apis::wire::optional_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub rate: Option<BigDecimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LedgerAction {
    pub identifier: u64,
    #[serde(flatten)]
    pub action: NewLedgerAction,
}

pub type LedgerActionEntry = Entry<LedgerAction>;
pub type LedgerActionCollection = Collection<LedgerActionEntry>;

/// Result of a mutating store action; failures carry the error message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionStatus {
    pub success: bool,
    pub message: String,
}

impl ActionStatus {
    pub fn from_result<T>(result: &crate::errors::FolioResult<T>) -> Self {
        match result {
            Ok(_) => Self {
                success: true,
                message: String::new(),
            },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
            },
        }
    }

    /// For endpoints that answer with a bare success flag
    pub fn from_flag(result: &crate::errors::FolioResult<bool>) -> Self {
        match result {
            Ok(false) => Self {
                success: false,
                message: String::new(),
            },
            other => Self::from_result(other),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::dec;
    use serde_json::json;

    #[test]
    fn test_refresh_payload_wire_shape() {
        let payload = TransactionRequestPayload::refresh_account(EvmChainAddress {
            address: "0xC".to_string(),
            evm_chain: "ethereum".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "limit": 0,
                "offset": 0,
                "ascending": [false],
                "order_by_attributes": ["timestamp"],
                "only_cache": false,
                "accounts": [{"address": "0xC", "evm_chain": "ethereum"}]
            })
        );
    }

    #[test]
    fn test_ledger_action_parses_string_amounts() {
        let action: LedgerAction = serde_json::from_value(json!({
            "identifier": 4,
            "timestamp": 1_600_000_000,
            "action_type": "income",
            "location": "kraken",
            "amount": "0.25",
            "asset": "ETH",
            "rate": "1800.5"
        }))
        .unwrap();

        assert_eq!(action.identifier, 4);
        assert_eq!(action.action.amount, dec("0.25"));
        assert_eq!(action.action.rate, Some(dec("1800.5")));
        assert_eq!(action.action.notes, None);
    }

    #[test]
    fn test_edited_ledger_action_keeps_amount_digits() {
        let wire = json!({
            "identifier": 9,
            "timestamp": 1_600_000_000,
            "action_type": "airdrop",
            "location": "blockchain",
            "amount": "1234567.123456789012345678",
            "asset": "UNI"
        });
        let action: LedgerAction = serde_json::from_value(wire.clone()).unwrap();

        assert_eq!(serde_json::to_value(&action).unwrap(), wire);
    }
}
