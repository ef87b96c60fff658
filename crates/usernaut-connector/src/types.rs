//! Backend-native user and team views shared by every connector.

use serde::{Deserialize, Serialize};

/// Role assigned to users and teams created by the reconciler.
pub const DEFAULT_ROLE: &str = "Account Reviewer";

/// A user as one backend sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,

    #[serde(default, rename = "first_name", skip_serializing_if = "String::is_empty")]
    pub first_name: String,

    #[serde(default, rename = "last_name", skip_serializing_if = "String::is_empty")]
    pub last_name: String,

    #[serde(default, rename = "display_name", skip_serializing_if = "String::is_empty")]
    pub display_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
}

impl User {
    /// A user carrying only a backend-native id.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// A team (or role) as one backend sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
}

impl Team {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serialization_skips_empty() {
        let user = User {
            id: "u1".to_string(),
            email: "alice@example.com".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&user).unwrap();
        assert_eq!(json, r#"{"id":"u1","email":"alice@example.com"}"#);
    }

    #[test]
    fn test_user_field_names() {
        let raw = r#"{
            "id": "u1",
            "username": "alice",
            "email": "alice@example.com",
            "first_name": "Alice",
            "last_name": "Doe",
            "display_name": "Alice D",
            "role": "Account Reviewer"
        }"#;
        let user: User = serde_json::from_str(raw).unwrap();
        assert_eq!(user.first_name, "Alice");
        assert_eq!(user.last_name, "Doe");
        assert_eq!(user.role, DEFAULT_ROLE);
    }

    #[test]
    fn test_team_round_trip() {
        let team = Team {
            id: "t1".to_string(),
            name: "data-platform".to_string(),
            description: "team for data-platform".to_string(),
            role: DEFAULT_ROLE.to_string(),
        };
        let json = serde_json::to_string(&team).unwrap();
        let parsed: Team = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, team);
    }
}
