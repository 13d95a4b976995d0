/// DeFi balances and protocol metadata endpoints
use super::client::{ApiClient, Request};
use super::traits::DefiApi;
use super::wire::{VALID_STATUS, VALID_WITH_EXTERNAL_SERVICE};
use crate::defi::{Module, ProtocolMetadata};
use crate::errors::FolioResult;
use crate::tasks::PendingTask;
use async_trait::async_trait;
use serde_json::json;

#[async_trait]
impl DefiApi for ApiClient {
    async fn fetch_all_defi(&self) -> FolioResult<PendingTask> {
        self.send(
            Request::get("blockchains/ETH/defi")
                .query(json!({ "async_query": true }))
                .allow(VALID_WITH_EXTERNAL_SERVICE),
        )
        .await
    }

    async fn fetch_module_balances(&self, module: Module) -> FolioResult<PendingTask> {
        let path = format!("blockchains/ETH/modules/{}", module.balances_path());
        self.send(
            Request::get(&path)
                .query(json!({ "async_query": true }))
                .allow(VALID_WITH_EXTERNAL_SERVICE),
        )
        .await
    }

    async fn fetch_defi_metadata(&self) -> FolioResult<Vec<ProtocolMetadata>> {
        self.send(Request::get("defi/metadata").allow(VALID_STATUS))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::test_server::serve;
    use crate::errors::FolioError;
    use crate::tasks::TaskId;
    use axum::routing::get;
    use axum::{Json, Router};

    #[tokio::test]
    async fn test_module_balances_path() {
        let router = Router::new()
            .route(
                "/api/1/blockchains/ETH/modules/yearn/vaultsv2/balances",
                get(|| async { Json(json!({"result": {"task_id": 12}, "message": ""})) }),
            )
            .route(
                "/api/1/defi/metadata",
                get(|| async {
                    Json(json!({
                        "result": [{"identifier": "aave", "name": "Aave", "icon": "aave.svg"}],
                        "message": ""
                    }))
                }),
            );
        let client = serve(router).await;

        let pending = client.fetch_module_balances(Module::YearnV2).await.unwrap();
        assert_eq!(pending.task_id, TaskId(12));

        let metadata = client.fetch_defi_metadata().await.unwrap();
        assert_eq!(metadata[0].name, "Aave");
    }

    #[tokio::test]
    async fn test_external_service_failure_is_reported() {
        let router = Router::new().route(
            "/api/1/blockchains/ETH/defi",
            get(|| async {
                (
                    axum::http::StatusCode::BAD_GATEWAY,
                    Json(json!({"result": null, "message": "Zerion unreachable"})),
                )
            }),
        );
        let client = serve(router).await;

        let err = client.fetch_all_defi().await.unwrap_err();
        assert_eq!(
            err,
            FolioError::Http {
                status: 502,
                message: "Zerion unreachable".to_string()
            }
        );
    }
}
