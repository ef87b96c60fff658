//! Reconciler error types.

use std::collections::BTreeMap;

use thiserror::Error;

use usernaut_cache::CacheError;
use usernaut_connector::error::ConnectorError;
use usernaut_connector::transform::TransformError;
use usernaut_directory::DirectoryError;

use crate::store::StoreError;

/// Error surfaced by a reconcile pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("name transform error: {0}")]
    Transform(#[from] TransformError),

    /// Per-backend convergence failures, keyed by backend type. The request
    /// re-enqueues while this map is non-empty.
    #[error("reconcile failed for {} backend(s)", errors.len())]
    BackendFailures { errors: BTreeMap<String, String> },

    /// Backend teardown failed; the finalizer stays so the next event retries.
    #[error("group deletion incomplete: {message}")]
    DeletionIncomplete { message: String },

    /// Onboarding was expected to record a backend id for this user.
    #[error("user id not found in cache for user '{user}' on backend '{instance_key}'")]
    UserIdMissing { user: String, instance_key: String },
}

/// Result type for reconcile operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;
