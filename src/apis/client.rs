/// Base HTTP client for the backend API
///
/// One request helper handles every endpoint: it builds the URL below the
/// versioned base, sends JSON bodies or query pairs, unwraps the
/// `{ result, message }` envelope and validates the result shape.
use super::wire::{query_pairs, ActionResult};
use crate::config::ApiConfig;
use crate::errors::{FolioError, FolioResult};
use crate::logger::{self, LogTag};
use futures::future::{AbortRegistration, Abortable};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use url::Url;

/// HTTP client wrapper; the request timeout is enforced by reqwest
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout_secs: u64) -> FolioResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FolioError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Body of a request
pub enum Payload {
    Empty,
    Json(Value),
    Query(Value),
}

/// One request description
pub struct Request<'a> {
    pub method: Method,
    pub path: &'a str,
    pub payload: Payload,
    /// Non-2xx statuses whose envelope is still read
    pub allowed: &'a [u16],
}

impl<'a> Request<'a> {
    pub fn get(path: &'a str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &'a str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &'a str) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: &'a str) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: &'a str) -> Self {
        Self::new(Method::DELETE, path)
    }

    fn new(method: Method, path: &'a str) -> Self {
        Self {
            method,
            path,
            payload: Payload::Empty,
            allowed: &[],
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.payload = Payload::Json(body);
        self
    }

    pub fn query(mut self, params: Value) -> Self {
        self.payload = Payload::Query(params);
        self
    }

    pub fn allow(mut self, statuses: &'a [u16]) -> Self {
        self.allowed = statuses;
        self
    }
}

/// Backend API client
pub struct ApiClient {
    http: HttpClient,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> FolioResult<Self> {
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| FolioError::Config(format!("Invalid api base_url {}: {}", base, e)))?;

        Ok(Self {
            http: HttpClient::new(config.timeout_secs)?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> FolioResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| FolioError::Config(format!("Invalid endpoint path {}: {}", path, e)))
    }

    /// Issue one request and return the typed `result` of the envelope
    pub async fn send<T: DeserializeOwned>(&self, request: Request<'_>) -> FolioResult<T> {
        self.send_abortable(request, None).await
    }

    /// Like `send`; aborting through the registration's handle fails the
    /// request with `Network`
    pub async fn send_abortable<T: DeserializeOwned>(
        &self,
        request: Request<'_>,
        abort: Option<AbortRegistration>,
    ) -> FolioResult<T> {
        let url = self.url(request.path)?;
        let endpoint = format!("{} {}", request.method, request.path);

        let mut builder = self.http.client().request(request.method.clone(), url);
        builder = match &request.payload {
            Payload::Empty => builder,
            Payload::Json(body) => builder.json(body),
            Payload::Query(params) => builder.query(&query_pairs(params)),
        };

        let start = Instant::now();
        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let outcome = match abort {
            Some(registration) => match Abortable::new(exchange, registration).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    logger::debug(LogTag::Api, &format!("{} aborted", endpoint));
                    return Err(FolioError::Network(format!("{} aborted", endpoint)));
                }
            },
            None => exchange.await,
        };

        let (status, text) = match outcome {
            Ok(pair) => pair,
            Err(e) => {
                logger::warning(LogTag::Api, &format!("{} failed: {}", endpoint, e));
                return Err(e.into());
            }
        };

        logger::verbose(
            LogTag::Api,
            &format!(
                "{} -> {} in {}ms",
                endpoint,
                status,
                start.elapsed().as_millis()
            ),
        );

        parse_envelope(&endpoint, status, &text, request.allowed)
    }
}

/// Unwrap the envelope of a response body
pub fn parse_envelope<T: DeserializeOwned>(
    endpoint: &str,
    status: u16,
    body: &str,
    allowed: &[u16],
) -> FolioResult<T> {
    let success = (200..300).contains(&status);
    let envelope = serde_json::from_str::<ActionResult<Value>>(body);

    if !success && !allowed.contains(&status) {
        let message = match envelope {
            Ok(envelope) if !envelope.message.is_empty() => envelope.message,
            _ => body.to_string(),
        };
        logger::warning(
            LogTag::Api,
            &format!("{} returned HTTP {}: {}", endpoint, status, message),
        );
        return Err(FolioError::Http { status, message });
    }

    let envelope = envelope.map_err(|e| FolioError::validation(endpoint, e))?;
    match envelope.result {
        Some(result) => {
            serde_json::from_value(result).map_err(|e| FolioError::validation(endpoint, e))
        }
        None => Err(FolioError::Http {
            status,
            message: envelope.message,
        }),
    }
}
