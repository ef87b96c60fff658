//! Directory connection configuration.

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};

/// Settings for the LDAP directory of record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Directory URL, e.g. `ldaps://ldap.corp.example.com`.
    pub server: String,

    /// Search base for non-user queries.
    #[serde(default, rename = "baseDN")]
    pub base_dn: String,

    /// DN template for user entries with a single `%s` placeholder for the
    /// user id, e.g. `uid=%s,ou=users,dc=example,dc=com`.
    #[serde(rename = "userDN")]
    pub user_dn: String,

    /// Filter applied to the base-object search, e.g. `(objectClass=person)`.
    #[serde(rename = "userSearchFilter")]
    pub user_search_filter: String,

    /// Attributes to fetch for each user.
    pub attributes: Vec<String>,

    /// DN to bind as. Absent means an anonymous bind.
    #[serde(default, rename = "bindDN", skip_serializing_if = "Option::is_none")]
    pub bind_dn: Option<String>,

    #[serde(default, rename = "bindPassword", skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Dial timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl DirectoryConfig {
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.server.is_empty() {
            return Err(DirectoryError::InvalidConfiguration {
                message: "server is required".to_string(),
            });
        }
        if !self.user_dn.contains("%s") {
            return Err(DirectoryError::InvalidConfiguration {
                message: "userDN must contain a %s placeholder".to_string(),
            });
        }
        if self.user_search_filter.is_empty() {
            return Err(DirectoryError::InvalidConfiguration {
                message: "userSearchFilter is required".to_string(),
            });
        }
        if self.attributes.is_empty() {
            return Err(DirectoryError::InvalidConfiguration {
                message: "at least one attribute is required".to_string(),
            });
        }
        Ok(())
    }
}
