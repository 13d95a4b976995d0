//! Throwaway HTTP backend for client tests

use super::client::ApiClient;
use crate::config::ApiConfig;
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Bind `router` on an ephemeral local port and return a client pointed at it
pub async fn serve(router: Router) -> ApiClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    ApiClient::new(&ApiConfig {
        base_url: format!("http://{}/api/1", addr),
        timeout_secs: 5,
    })
    .unwrap()
}

/// Request bodies seen by a handler
#[derive(Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<Value>>>);

impl Recorded {
    pub fn push(&self, value: Value) {
        self.0.lock().push(value);
    }

    pub fn take(&self) -> Vec<Value> {
        std::mem::take(&mut *self.0.lock())
    }
}
