//! Typed view of a directory entry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};

/// Attributes of a directory user, named per the directory schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    #[serde(default)]
    pub uid: String,

    #[serde(default)]
    pub cn: String,

    #[serde(default)]
    pub sn: String,

    #[serde(default, rename = "displayName")]
    pub display_name: String,

    #[serde(default)]
    pub mail: String,
}

impl DirectoryUser {
    /// Decode a raw attribute map into the typed view.
    ///
    /// Unknown attributes are ignored; missing ones default to empty.
    pub fn from_attributes(
        user_id: &str,
        attributes: &HashMap<String, String>,
    ) -> DirectoryResult<Self> {
        let value = serde_json::to_value(attributes).map_err(|e| DirectoryError::MalformedEntry {
            user_id: user_id.to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_value(value).map_err(|e| DirectoryError::MalformedEntry {
            user_id: user_id.to_string(),
            message: e.to_string(),
        })
    }

    /// Canonical lowercased email, the pivot key of the identity cache.
    #[must_use]
    pub fn email(&self) -> String {
        self.mail.to_lowercase()
    }
}
