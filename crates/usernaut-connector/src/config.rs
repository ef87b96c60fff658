//! Backend and HTTP client configuration types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, ConnectorResult};

/// Static configuration of one backend instance.
///
/// `connection` is a heterogeneous map interpreted per-type by the connector
/// factory: each factory deserializes it into its own typed config via
/// [`BackendConfig::parse_connection`], which performs typed coercion and
/// rejects shapes the target type does not declare.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub backend_type: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub connection: serde_json::Map<String, serde_json::Value>,
}

impl BackendConfig {
    /// The `<name>_<type>` key identifying this instance in cache mappings.
    #[must_use]
    pub fn instance_key(&self) -> String {
        format!("{}_{}", self.name, self.backend_type)
    }

    /// Deserialize the `connection` map into a per-type typed config.
    pub fn parse_connection<T: DeserializeOwned>(&self) -> ConnectorResult<T> {
        serde_json::from_value(serde_json::Value::Object(self.connection.clone())).map_err(|e| {
            ConnectorError::InvalidConfiguration {
                message: format!(
                    "invalid connection config for backend '{}' ({}): {e}",
                    self.name, self.backend_type
                ),
            }
        })
    }

    /// Fetch one string field of the connection map.
    #[must_use]
    pub fn connection_string(&self, field: &str) -> Option<String> {
        self.connection
            .get(field)
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
    }
}

/// Shared HTTP client settings applied to every REST-backed connector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpClientConfig {
    #[serde(default, rename = "connectionPoolConfig")]
    pub connection_pool: ConnectionPoolConfig,

    #[serde(default, rename = "hystrixResiliencyConfig")]
    pub resiliency: ResiliencyConfig,
}

/// Connection pool tuning for outbound HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPoolConfig {
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,

    /// Keep-alive / idle connection timeout in milliseconds.
    #[serde(default = "default_keep_alive_ms", rename = "keepAliveTimeout")]
    pub keep_alive_timeout: u64,

    /// Maximum idle connections kept per host.
    #[serde(default = "default_max_idle", rename = "maxIdleConnections")]
    pub max_idle_connections: usize,

    /// Client certificate path for mTLS.
    #[serde(default, rename = "certPath", skip_serializing_if = "Option::is_none")]
    pub cert_path: Option<String>,

    /// Client private key path for mTLS.
    #[serde(default, rename = "privateKeyPath", skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_keep_alive_ms() -> u64 {
    30_000
}

fn default_max_idle() -> usize {
    10
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout_ms(),
            keep_alive_timeout: default_keep_alive_ms(),
            max_idle_connections: default_max_idle(),
            cert_path: None,
            private_key_path: None,
        }
    }
}

/// Circuit breaker settings, hystrix-shaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResiliencyConfig {
    /// Maximum concurrent in-flight requests per backend.
    #[serde(default = "default_max_concurrent", rename = "maxConcurrentRequests")]
    pub max_concurrent_requests: usize,

    /// Minimum requests in the rolling window before the circuit can trip.
    #[serde(default = "default_volume_threshold", rename = "requestVolumeThreshold")]
    pub request_volume_threshold: u32,

    /// How long an open circuit waits before probing, in milliseconds.
    #[serde(default = "default_sleep_window_ms", rename = "circuitBreakerSleepWindow")]
    pub sleep_window: u64,

    /// Error percentage that trips the circuit.
    #[serde(default = "default_error_percent", rename = "errorPercentThreshold")]
    pub error_percent_threshold: u32,

    /// Overall command timeout in milliseconds.
    #[serde(default = "default_breaker_timeout_ms", rename = "circuitBreakerTimeout")]
    pub timeout: u64,
}

fn default_max_concurrent() -> usize {
    100
}

fn default_volume_threshold() -> u32 {
    20
}

fn default_sleep_window_ms() -> u64 {
    5000
}

fn default_error_percent() -> u32 {
    50
}

fn default_breaker_timeout_ms() -> u64 {
    10_000
}

impl Default for ResiliencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
            request_volume_threshold: default_volume_threshold(),
            sleep_window: default_sleep_window_ms(),
            error_percent_threshold: default_error_percent(),
            timeout: default_breaker_timeout_ms(),
        }
    }
}
