//! # Directory Reader
//!
//! Lookups against the directory of record (LDAP). The reconciler uses it to
//! enrich group members with attributes; the offboarding sweep uses it to
//! decide whether a cached identity still exists.
//!
//! The crucial contract point: a user that is *absent* surfaces as the typed
//! [`DirectoryError::UserNotFound`], never as a transport error, because
//! absence is what makes a user eligible for offboarding.

pub mod client;
pub mod config;
pub mod error;
pub mod user;

use std::collections::HashMap;

use async_trait::async_trait;

pub use crate::client::LdapDirectory;
pub use crate::config::DirectoryConfig;
pub use crate::error::{DirectoryError, DirectoryResult};
pub use crate::user::DirectoryUser;

/// Read-only view of the directory of record.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Fetch the configured attributes for one user.
    ///
    /// Returns [`DirectoryError::UserNotFound`] when the directory has no
    /// entry for `user_id`; any other error is a transport or protocol
    /// failure and must not be read as absence.
    async fn user_attributes(&self, user_id: &str) -> DirectoryResult<HashMap<String, String>>;
}
