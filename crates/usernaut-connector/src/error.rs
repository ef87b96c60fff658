//! Connector error types with transient/permanent classification.

use thiserror::Error;

/// Error that can occur during connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Configuration errors (permanent, terminal at construction)
    /// Backend connection configuration is missing or invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// No backend of this `(name, type)` is configured.
    #[error("unknown backend: {name} ({backend_type})")]
    UnknownBackend { name: String, backend_type: String },

    /// The backend is configured but disabled.
    #[error("backend is not enabled: {name} ({backend_type})")]
    BackendDisabled { name: String, backend_type: String },

    // Transport errors (transient)
    /// Could not reach the backend.
    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The call exceeded the configured timeout.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// The circuit breaker for this backend is open.
    #[error("circuit breaker open for backend '{backend}'")]
    CircuitOpen { backend: String },

    /// The backend answered with an unexpected HTTP status.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    // Operation errors
    /// The object already exists in the backend (create conflict).
    #[error("object already exists: {identifier}")]
    AlreadyExists { identifier: String },

    /// The object does not exist in the backend.
    #[error("object not found: {identifier}")]
    NotFound { identifier: String },

    /// The backend does not support this operation.
    #[error("operation not supported: {operation}")]
    Unsupported { operation: String },

    /// One or more per-user operations inside a batch failed.
    #[error("batch operation failed for {} user(s): {}", failures.len(), failures.join("; "))]
    Batch { failures: Vec<String> },

    /// A response body did not decode.
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl ConnectorError {
    /// Whether retrying the operation may help.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ConnectorError::Network { .. }
            | ConnectorError::Timeout { .. }
            | ConnectorError::CircuitOpen { .. } => true,
            ConnectorError::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Whether the failure requires configuration or operator intervention.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    // Convenience constructors

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        ConnectorError::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        ConnectorError::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        ConnectorError::Serialization {
            message: message.into(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
