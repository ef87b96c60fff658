//! Interface to the cluster store.
//!
//! The reconciler consumes the cluster through this trait only; the
//! kube-backed implementation lives here, and tests substitute an in-memory
//! one.

use async_trait::async_trait;
use kube::api::{Api, ListParams, Patch, PatchParams};
use thiserror::Error;

use crate::group::Group;

/// Error raised by cluster store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cluster store error: {message}")]
    Api { message: String },
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        StoreError::Api {
            message: err.to_string(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Group lookups and writes against the cluster store.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Fetch one group; an absent group is `Ok(None)`.
    async fn get(&self, namespace: &str, name: &str) -> StoreResult<Option<Group>>;

    /// All groups in a namespace.
    async fn list(&self, namespace: &str) -> StoreResult<Vec<Group>>;

    /// Persist the group's finalizers and owner references.
    async fn update_metadata(&self, group: &Group) -> StoreResult<()>;

    /// Persist the group's status subresource.
    async fn update_status(&self, group: &Group) -> StoreResult<()>;
}

/// Kube-client-backed store.
pub struct KubeGroupStore {
    client: kube::Client,
}

impl KubeGroupStore {
    #[must_use]
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Group> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn coordinates(group: &Group) -> StoreResult<(String, String)> {
        let namespace = group.metadata.namespace.clone().ok_or(StoreError::Api {
            message: "group has no namespace".to_string(),
        })?;
        let name = group.metadata.name.clone().ok_or(StoreError::Api {
            message: "group has no name".to_string(),
        })?;
        Ok((namespace, name))
    }
}

#[async_trait]
impl GroupStore for KubeGroupStore {
    async fn get(&self, namespace: &str, name: &str) -> StoreResult<Option<Group>> {
        Ok(self.api(namespace).get_opt(name).await?)
    }

    async fn list(&self, namespace: &str) -> StoreResult<Vec<Group>> {
        let groups = self.api(namespace).list(&ListParams::default()).await?;
        Ok(groups.items)
    }

    async fn update_metadata(&self, group: &Group) -> StoreResult<()> {
        let (namespace, name) = Self::coordinates(group)?;
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": group.metadata.finalizers,
                "ownerReferences": group.metadata.owner_references,
            }
        });
        self.api(&namespace)
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn update_status(&self, group: &Group) -> StoreResult<()> {
        let (namespace, name) = Self::coordinates(group)?;
        let patch = serde_json::json!({ "status": group.status });
        self.api(&namespace)
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}
