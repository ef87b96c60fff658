//! Directory error types.

use thiserror::Error;

/// LDAP result code for `noSuchObject`.
pub(crate) const RC_NO_SUCH_OBJECT: u32 = 32;

/// Error raised by directory lookups.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory has no entry for the requested user. Drives offboarding
    /// eligibility and is deliberately distinct from every transport failure.
    #[error("no directory entry found for user '{user_id}'")]
    UserNotFound { user_id: String },

    /// Could not reach the directory, or the connection died mid-call.
    #[error("directory connection failed: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The directory answered with a protocol-level failure.
    #[error("directory search failed with result code {code}: {message}")]
    Search { code: u32, message: String },

    /// The directory configuration is unusable.
    #[error("invalid directory configuration: {message}")]
    InvalidConfiguration { message: String },

    /// An entry's attributes did not decode into the expected shape.
    #[error("malformed directory entry for user '{user_id}': {message}")]
    MalformedEntry { user_id: String, message: String },
}

impl DirectoryError {
    pub fn connection(message: impl Into<String>) -> Self {
        DirectoryError::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True when the error means the user does not exist, including the raw
    /// `noSuchObject` protocol code.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::UserNotFound { .. })
            || matches!(self, DirectoryError::Search { code, .. } if *code == RC_NO_SUCH_OBJECT)
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let err = DirectoryError::UserNotFound {
            user_id: "alice".to_string(),
        };
        assert!(err.is_not_found());

        let err = DirectoryError::Search {
            code: RC_NO_SUCH_OBJECT,
            message: "noSuchObject".to_string(),
        };
        assert!(err.is_not_found());
    }

    #[test]
    fn test_transport_is_not_absence() {
        let err = DirectoryError::connection("tcp reset");
        assert!(!err.is_not_found());

        let err = DirectoryError::Search {
            code: 52,
            message: "unavailable".to_string(),
        };
        assert!(!err.is_not_found());
    }
}
