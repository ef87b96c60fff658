//! Fivetran API wire types.

use serde::{Deserialize, Serialize};

use usernaut_connector::types::User;

/// Standard response envelope.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct Envelope<T> {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub message: String,

    pub data: T,
}

/// Cursor-paginated listing payload.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,

    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A platform user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FivetranUser {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub given_name: String,

    #[serde(default)]
    pub family_name: String,

    #[serde(default)]
    pub role: String,
}

impl From<FivetranUser> for User {
    fn from(user: FivetranUser) -> Self {
        User {
            id: user.id,
            username: String::new(),
            email: user.email.to_lowercase(),
            first_name: user.given_name,
            last_name: user.family_name,
            display_name: String::new(),
            role: user.role,
        }
    }
}

/// Body of a user invitation.
#[derive(Debug, Serialize)]
pub struct InviteUserRequest {
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub role: String,
}

/// A team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FivetranTeam {
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub role: String,
}

/// One row of a team membership listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamMembership {
    pub user_id: String,

    #[serde(default)]
    pub role: String,
}

/// Body of a membership addition.
#[derive(Debug, Serialize)]
pub struct AddMembershipRequest {
    pub user_id: String,
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_decodes_cursor() {
        let raw = r#"{"items": [{"user_id": "u1", "role": "Team Member"}], "next_cursor": "abc"}"#;
        let page: Page<TeamMembership> = serde_json::from_str(raw).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn test_page_last_page_has_no_cursor() {
        let raw = r#"{"items": []}"#;
        let page: Page<TeamMembership> = serde_json::from_str(raw).unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_user_conversion_lowercases_email() {
        let user = FivetranUser {
            id: "u1".to_string(),
            email: "Alice@Example.com".to_string(),
            given_name: "Alice".to_string(),
            family_name: "Doe".to_string(),
            role: String::new(),
        };
        let converted: User = user.into();
        assert_eq!(converted.email, "alice@example.com");
        assert_eq!(converted.first_name, "Alice");
    }
}
