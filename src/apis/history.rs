/// Transactions, history events and ledger actions endpoints
use super::client::{ApiClient, Request};
use super::traits::{LedgerActionsApi, LedgerActionsResponse, TransactionsApi, TransactionsResponse};
use super::wire::{
    non_empty_properties, snake_case_attributes, with_async_query, VALID_STATUS,
    VALID_WITH_EXTERNAL_SERVICE,
};
use crate::errors::{FolioError, FolioResult};
use crate::history::{
    HistoryEvent, LedgerAction, LedgerActionRequestPayload, NewLedgerAction,
    TransactionEventRequestPayload, TransactionRequestPayload,
};
use crate::tasks::PendingTask;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const TRANSACTIONS_PATH: &str = "blockchains/evm/transactions";
const DECODE_PATH: &str = "blockchains/evm/transactions/decode";
const HISTORY_EVENTS_PATH: &str = "history/events";
const LEDGER_ACTIONS_PATH: &str = "ledgeractions";

/// Backend-assigned identifier of a created entry
#[derive(Debug, Deserialize)]
struct Identifier {
    identifier: u64,
}

/// Extra detail of a history event, shape depends on the event kind
pub type EventDetails = Map<String, Value>;

/// Serialize a collection payload with `async_query` and wire attribute names
fn collection_body<T: Serialize>(
    payload: &T,
    order_by_attributes: &[String],
    async_query: bool,
) -> FolioResult<Value> {
    let mut body = with_async_query(payload, async_query)
        .map_err(|e| FolioError::validation("collection payload", e))?;
    if let Value::Object(map) = &mut body {
        map.insert(
            "order_by_attributes".to_string(),
            json!(snake_case_attributes(order_by_attributes)),
        );
    }
    Ok(non_empty_properties(body))
}

impl ApiClient {
    async fn transactions_request<T: serde::de::DeserializeOwned>(
        &self,
        payload: &TransactionRequestPayload,
        async_query: bool,
    ) -> FolioResult<T> {
        let body = collection_body(payload, &payload.order_by_attributes, async_query)?;
        self.send(
            Request::post(TRANSACTIONS_PATH)
                .json(body)
                .allow(VALID_WITH_EXTERNAL_SERVICE),
        )
        .await
    }

    async fn ledger_actions_request<T: serde::de::DeserializeOwned>(
        &self,
        payload: &LedgerActionRequestPayload,
        async_query: bool,
    ) -> FolioResult<T> {
        let params = collection_body(payload, &payload.order_by_attributes, async_query)?;
        self.send(
            Request::get(LEDGER_ACTIONS_PATH)
                .query(params)
                .allow(VALID_WITH_EXTERNAL_SERVICE),
        )
        .await
    }

    /// Purge every stored EVM transaction
    pub async fn delete_transactions(&self) -> FolioResult<bool> {
        self.send(Request::delete(TRANSACTIONS_PATH).allow(VALID_STATUS))
            .await
    }

    pub async fn get_event_details(&self, identifier: u64) -> FolioResult<EventDetails> {
        self.send(
            Request::get("history/events/details").query(json!({ "identifier": identifier })),
        )
        .await
    }
}

#[async_trait]
impl TransactionsApi for ApiClient {
    async fn fetch_transactions(
        &self,
        payload: &TransactionRequestPayload,
    ) -> FolioResult<TransactionsResponse> {
        self.transactions_request(payload, false).await
    }

    async fn fetch_transactions_task(
        &self,
        payload: &TransactionRequestPayload,
    ) -> FolioResult<PendingTask> {
        self.transactions_request(payload, true).await
    }

    async fn fetch_transaction_events(
        &self,
        payload: &TransactionEventRequestPayload,
    ) -> FolioResult<PendingTask> {
        let body = with_async_query(payload, true)
            .map_err(|e| FolioError::validation("event request", e))?;
        self.send(Request::put(TRANSACTIONS_PATH).json(body)).await
    }

    async fn redecode_missing_events(&self, evm_chains: &[String]) -> FolioResult<PendingTask> {
        let data: Vec<Value> = evm_chains
            .iter()
            .map(|chain| json!({ "evm_chain": chain }))
            .collect();
        self.send(
            Request::post(DECODE_PATH)
                .json(json!({ "async_query": true, "data": data }))
                .allow(VALID_STATUS),
        )
        .await
    }

    async fn add_history_event(&self, event: &HistoryEvent) -> FolioResult<u64> {
        let body = serde_json::to_value(event)
            .map_err(|e| FolioError::validation("history event", e))?;
        let created: Identifier = self
            .send(
                Request::put(HISTORY_EVENTS_PATH)
                    .json(body)
                    .allow(VALID_STATUS),
            )
            .await?;
        Ok(created.identifier)
    }

    async fn edit_history_event(&self, event: &HistoryEvent) -> FolioResult<bool> {
        let body = serde_json::to_value(event)
            .map_err(|e| FolioError::validation("history event", e))?;
        self.send(
            Request::patch(HISTORY_EVENTS_PATH)
                .json(body)
                .allow(VALID_STATUS),
        )
        .await
    }

    async fn delete_history_events(&self, identifiers: &[u64]) -> FolioResult<bool> {
        self.send(
            Request::delete(HISTORY_EVENTS_PATH)
                .json(json!({ "identifiers": identifiers }))
                .allow(VALID_STATUS),
        )
        .await
    }
}

#[async_trait]
impl LedgerActionsApi for ApiClient {
    async fn get_ledger_actions(
        &self,
        payload: &LedgerActionRequestPayload,
    ) -> FolioResult<LedgerActionsResponse> {
        self.ledger_actions_request(payload, false).await
    }

    async fn get_ledger_actions_task(
        &self,
        payload: &LedgerActionRequestPayload,
    ) -> FolioResult<PendingTask> {
        self.ledger_actions_request(payload, true).await
    }

    async fn add_ledger_action(&self, action: &NewLedgerAction) -> FolioResult<u64> {
        let body = serde_json::to_value(action)
            .map_err(|e| FolioError::validation("ledger action", e))?;
        let created: Identifier = self
            .send(
                Request::put(LEDGER_ACTIONS_PATH)
                    .json(body)
                    .allow(VALID_STATUS),
            )
            .await?;
        Ok(created.identifier)
    }

    async fn edit_ledger_action(&self, action: &LedgerAction) -> FolioResult<LedgerActionsResponse> {
        let body = serde_json::to_value(action)
            .map_err(|e| FolioError::validation("ledger action", e))?;
        self.send(
            Request::patch(LEDGER_ACTIONS_PATH)
                .json(body)
                .allow(VALID_STATUS),
        )
        .await
    }

    async fn delete_ledger_actions(&self, identifiers: &[u64]) -> FolioResult<bool> {
        self.send(
            Request::delete(LEDGER_ACTIONS_PATH)
                .json(json!({ "identifiers": identifiers }))
                .allow(VALID_STATUS),
        )
        .await
    }
}
