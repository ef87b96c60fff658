//! Cache error types.

use thiserror::Error;

/// Error raised by cache drivers and codec helpers.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The configured driver name is not recognized.
    #[error("invalid cache driver: {driver}")]
    InvalidDriver { driver: String },

    /// The backing store could not be reached or refused the operation.
    #[error("cache backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A scan pattern failed to parse as a shell-style glob.
    #[error("invalid key pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A stored value is not the JSON shape the caller expected.
    #[error("malformed cache entry for key '{key}': {message}")]
    MalformedEntry { key: String, message: String },
}

impl CacheError {
    pub fn backend(message: impl Into<String>) -> Self {
        CacheError::Backend {
            message: message.into(),
            source: None,
        }
    }

    pub fn backend_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        CacheError::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::InvalidDriver {
            driver: "foo".to_string(),
        };
        assert_eq!(err.to_string(), "invalid cache driver: foo");

        let err = CacheError::MalformedEntry {
            key: "user@example.com".to_string(),
            message: "expected object".to_string(),
        };
        assert!(err.to_string().contains("user@example.com"));
    }

    #[test]
    fn test_backend_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = CacheError::backend_with_source("redis unavailable", io);
        if let CacheError::Backend { source, .. } = &err {
            assert!(source.is_some());
        } else {
            panic!("expected Backend variant");
        }
    }
}
