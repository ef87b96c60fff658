//! The user offboarding sweep.
//!
//! Once a day, every username recorded in `user_list` is checked against the
//! directory of record. Users the directory no longer knows are deleted from
//! every non-preserved backend recorded in their cache mapping, then their
//! cache entry and `user_list` slot are removed. A directory transport error
//! leaves the user untouched.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use usernaut_cache::{
    parse_backend_mapping, parse_user_list, render_user_list, Cache, SharedCacheLock,
    USER_LIST_KEY,
};
use usernaut_connector::traits::Connector;
use usernaut_directory::Directory;

use crate::periodic::{PeriodicTask, TaskError};

/// Unique task name.
pub const OFFBOARDING_TASK_NAME: &str = "usernaut_user_offboarding";

/// Daily cleanup cadence.
pub const OFFBOARDING_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Backend types whose access survives offboarding when none are configured.
pub const DEFAULT_PRESERVED_TYPES: &[&str] = &["rover", "gitlab"];

/// The offboarding sweep.
pub struct OffboardingJob {
    cache: Arc<dyn Cache>,
    cache_lock: SharedCacheLock,
    directory: Arc<dyn Directory>,
    /// Connectors for every enabled backend, keyed by `<name>_<type>`.
    connectors: HashMap<String, Arc<dyn Connector>>,
    /// Lowercased backend types that keep their access.
    preserved_types: HashSet<String>,
}

impl OffboardingJob {
    #[must_use]
    pub fn new(
        cache: Arc<dyn Cache>,
        cache_lock: SharedCacheLock,
        directory: Arc<dyn Directory>,
        connectors: HashMap<String, Arc<dyn Connector>>,
        preserved_types: &[String],
    ) -> Self {
        let preserved_types = if preserved_types.is_empty() {
            DEFAULT_PRESERVED_TYPES
                .iter()
                .map(|t| (*t).to_string())
                .collect()
        } else {
            preserved_types.iter().map(|t| t.to_lowercase()).collect()
        };

        Self {
            cache,
            cache_lock,
            directory,
            connectors,
            preserved_types,
        }
    }

    /// One full sweep across `user_list`.
    async fn sweep(&self, token: &CancellationToken) -> Result<(), TaskError> {
        let user_list = self.candidate_users().await?;
        info!(count = user_list.len(), "starting offboarding sweep");

        let mut offboarded = 0usize;
        let mut errors: Vec<String> = Vec::new();

        for user_id in &user_list {
            // Cancellation aborts between users, never mid-user.
            if token.is_cancelled() {
                info!("offboarding sweep cancelled");
                break;
            }

            match self.process_user(user_id).await {
                Ok(true) => offboarded += 1,
                Ok(false) => {}
                Err(e) => errors.push(format!("{user_id}: {e}")),
            }
        }

        info!(
            total = user_list.len(),
            offboarded,
            errors = errors.len(),
            "offboarding sweep complete"
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(format!("offboarding completed with {} errors: {}", errors.len(), errors.join("; "))
                .into())
        }
    }

    async fn candidate_users(&self) -> Result<Vec<String>, TaskError> {
        let _guard = self.cache_lock.read().await;
        match self.cache.get(USER_LIST_KEY).await? {
            Some(raw) => Ok(parse_user_list(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Returns `Ok(true)` when the user was offboarded.
    async fn process_user(&self, user_id: &str) -> Result<bool, TaskError> {
        match self.directory.user_attributes(user_id).await {
            Ok(_) => return Ok(false),
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                // A transport failure must never read as absence.
                warn!(user = %user_id, error = %e, "directory check failed, leaving user untouched");
                return Err(Box::new(e));
            }
        }

        info!(user = %user_id, "user gone from directory, offboarding");

        let (email, mapping) = self.resolve_cache_entry(user_id).await?;
        self.revoke_backends(user_id, &mapping).await?;

        let _guard = self.cache_lock.write().await;
        self.cache.delete(&email).await?;
        self.remove_from_user_list(user_id).await?;

        info!(user = %user_id, email = %email, "user offboarded");
        Ok(true)
    }

    /// Find the user's cache entry by substring pattern; the canonical key
    /// ordering of the scan makes the first valid match deterministic.
    async fn resolve_cache_entry(
        &self,
        user_id: &str,
    ) -> Result<(String, BTreeMap<String, String>), TaskError> {
        let _guard = self.cache_lock.read().await;

        let matches = self
            .cache
            .get_by_pattern(&format!("*{user_id}*"))
            .await?;

        for (email, raw) in matches {
            if email == USER_LIST_KEY {
                continue;
            }
            match parse_backend_mapping(&email, &raw) {
                Ok(mapping) => return Ok((email, mapping)),
                Err(e) => {
                    warn!(user = %user_id, key = %email, error = %e, "skipping malformed cache entry");
                }
            }
        }

        Err(format!("no cache entry found for user '{user_id}'").into())
    }

    /// Delete the user on every non-preserved backend the mapping lists,
    /// accumulating failures without aborting the user.
    async fn revoke_backends(
        &self,
        user_id: &str,
        mapping: &BTreeMap<String, String>,
    ) -> Result<(), TaskError> {
        // Sequential over a sorted connector list for deterministic logs.
        let mut keys: Vec<&String> = self.connectors.keys().collect();
        keys.sort();

        let mut failures = Vec::new();
        for instance_key in keys {
            let Some((_, backend_type)) = instance_key.rsplit_once('_') else {
                warn!(backend = %instance_key, "skipping backend with invalid instance key");
                continue;
            };

            if self.preserved_types.contains(&backend_type.to_lowercase()) {
                info!(user = %user_id, backend = %instance_key, "preserving access on excluded backend type");
                continue;
            }

            let Some(backend_user_id) = mapping.get(instance_key) else {
                continue;
            };

            match self.connectors[instance_key].delete_user(backend_user_id).await {
                Ok(()) => {
                    info!(user = %user_id, backend = %instance_key, backend_user_id = %backend_user_id, "deleted user in backend");
                }
                Err(e) => {
                    warn!(user = %user_id, backend = %instance_key, error = %e, "failed to delete user in backend");
                    failures.push(format!("backend {instance_key}: {e}"));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(format!("failed to remove user from some backends: {}", failures.join("; ")).into())
        }
    }

    async fn remove_from_user_list(&self, user_id: &str) -> Result<(), TaskError> {
        let Some(raw) = self.cache.get(USER_LIST_KEY).await? else {
            return Ok(());
        };
        let user_list = parse_user_list(&raw)?;
        let updated: Vec<String> = user_list.into_iter().filter(|u| u != user_id).collect();
        self.cache
            .set(USER_LIST_KEY, &render_user_list(&updated), None)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PeriodicTask for OffboardingJob {
    fn name(&self) -> &str {
        OFFBOARDING_TASK_NAME
    }

    fn interval(&self) -> Duration {
        OFFBOARDING_INTERVAL
    }

    async fn run(&self, token: &CancellationToken) -> Result<(), TaskError> {
        self.sweep(token).await
    }
}
