//! # Group Controller
//!
//! The reconciliation engine driving declared [`Group`] resources onto their
//! backends, plus the periodic task machinery that hosts the offboarding
//! sweep.
//!
//! - [`group`] - the `Group` custom resource types and status helpers
//! - [`store`] - the interface consumed from the cluster store, with the
//!   kube-backed implementation
//! - [`expand`] - transitive member expansion over the group DAG
//! - [`reconciler`] - the per-group reconcile algorithm
//! - [`periodic`] - interval-driven background tasks with a cache-gated start
//! - [`offboarding`] - the daily sweep revoking access for users gone from
//!   the directory of record

pub mod error;
pub mod expand;
pub mod group;
pub mod offboarding;
pub mod periodic;
pub mod reconciler;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{ReconcileError, ReconcileResult};
pub use group::{BackendRef, BackendStatus, Group, GroupMembers, GroupSpec, GroupStatus};
pub use reconciler::GroupReconciler;
pub use store::{GroupStore, KubeGroupStore, StoreError};
