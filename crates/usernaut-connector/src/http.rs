//! Shared HTTP execution for REST-backed connectors.
//!
//! One `HttpDoer` per backend instance: a pooled reqwest client (optionally
//! mTLS) with every call routed through the circuit breaker, a command
//! timeout, and constant-backoff retries for transient failures. Server
//! errors (5xx) are breaker failures and retried; 4xx responses are returned
//! to the connector for interpretation (403/409 conflicts carry meaning).

use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::HttpClientConfig;
use crate::error::{ConnectorError, ConnectorResult};
use crate::resilience::CircuitBreaker;

/// Retries after a transient failure.
const MAX_RETRIES: u32 = 3;

/// Constant backoff between retries.
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// A decoded HTTP response below the server-error threshold.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> ConnectorResult<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            ConnectorError::serialization(format!("failed to decode response body: {e}"))
        })
    }

    /// First value of a header, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// HTTP executor shared by the REST-backed connectors.
pub struct HttpDoer {
    client: reqwest::Client,
    breaker: CircuitBreaker,
    timeout_ms: u64,
}

impl HttpDoer {
    /// Build a doer for one backend instance.
    pub fn new(backend: impl Into<String>, config: &HttpClientConfig) -> ConnectorResult<Self> {
        let backend = backend.into();
        let pool = &config.connection_pool;

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_millis(pool.timeout))
            .pool_idle_timeout(Duration::from_millis(pool.keep_alive_timeout))
            .pool_max_idle_per_host(pool.max_idle_connections)
            .tcp_keepalive(Duration::from_millis(pool.keep_alive_timeout));

        if let (Some(cert_path), Some(key_path)) = (&pool.cert_path, &pool.private_key_path) {
            let mut pem = std::fs::read(cert_path).map_err(|e| {
                ConnectorError::invalid_configuration(format!(
                    "failed to read client certificate {cert_path}: {e}"
                ))
            })?;
            pem.extend(std::fs::read(key_path).map_err(|e| {
                ConnectorError::invalid_configuration(format!(
                    "failed to read client key {key_path}: {e}"
                ))
            })?);
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                ConnectorError::invalid_configuration(format!("invalid client identity: {e}"))
            })?;
            builder = builder.identity(identity);
        }

        let client = builder.build().map_err(|e| {
            ConnectorError::invalid_configuration(format!("failed to build http client: {e}"))
        })?;

        Ok(Self {
            client,
            breaker: CircuitBreaker::new(backend, config.resiliency.clone()),
            timeout_ms: pool.timeout,
        })
    }

    /// The underlying client, for building requests.
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Execute a request with breaker protection and transient retries.
    pub async fn execute(&self, request: reqwest::RequestBuilder) -> ConnectorResult<HttpResponse> {
        let mut attempt = 0;
        loop {
            let Some(current) = request.try_clone() else {
                // Streaming bodies cannot be retried.
                return self.dispatch(request).await;
            };

            match self.dispatch(current).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    debug!(
                        backend = %self.breaker.backend(),
                        attempt, error = %e, "retrying transient failure"
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn dispatch(&self, request: reqwest::RequestBuilder) -> ConnectorResult<HttpResponse> {
        let timeout_ms = self.timeout_ms;
        self.breaker
            .execute(|| async move {
                let response = request.send().await.map_err(|e| {
                    if e.is_timeout() {
                        ConnectorError::Timeout { timeout_ms }
                    } else {
                        ConnectorError::network_with_source("request failed", e)
                    }
                })?;

                let status = response.status().as_u16();
                let headers = response.headers().clone();
                let body = response.text().await.map_err(|e| {
                    ConnectorError::network_with_source("failed to read response body", e)
                })?;

                if status >= 500 {
                    return Err(ConnectorError::UnexpectedStatus { status, body });
                }

                Ok(HttpResponse {
                    status,
                    headers,
                    body,
                })
            })
            .await
    }
}
