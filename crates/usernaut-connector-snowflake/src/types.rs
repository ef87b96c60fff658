//! Snowflake API wire types.

use serde::{Deserialize, Serialize};

/// A warehouse user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnowflakeUser {
    pub name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,
}

/// A role; teams map onto roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnowflakeRole {
    pub name: String,

    #[serde(default)]
    pub comment: String,
}

/// One grant row from `grants-of`.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeGrant {
    #[serde(default)]
    pub granted_to: String,

    #[serde(default)]
    pub grantee_name: String,
}

/// Target of a role grant or revoke.
#[derive(Debug, Serialize)]
pub struct Securable {
    pub name: String,
}

/// Body of `POST /api/v2/users/{name}/grants[:revoke]`.
#[derive(Debug, Serialize)]
pub struct GrantRequest {
    pub securable: Securable,
    pub securable_type: String,
}

impl GrantRequest {
    #[must_use]
    pub fn role(role_name: &str) -> Self {
        Self {
            securable: Securable {
                name: role_name.to_string(),
            },
            securable_type: "ROLE".to_string(),
        }
    }
}

/// Grants listed for users only; role-to-role grants are ignored.
pub const GRANTED_TO_USER: &str = "USER";
