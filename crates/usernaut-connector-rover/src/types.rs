//! Rover API wire types.

use serde::{Deserialize, Serialize};

pub const MEMBER_TYPE_USER: &str = "user";
pub const MEMBER_TYPE_SERVICE_ACCOUNT: &str = "serviceaccount";
pub const MEMBER_APPROVAL_SELF_SERVICE: &str = "self-service";

/// A group member or owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    #[serde(rename = "type")]
    pub member_type: String,
}

/// Full group spec sent on creation and returned on fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoverGroup {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "memberApprovalType")]
    pub member_approval_type: String,

    #[serde(default)]
    pub owners: Vec<Member>,

    #[serde(default)]
    pub members: Vec<Member>,

    #[serde(default, rename = "contactList")]
    pub contact_list: String,

    #[serde(default)]
    pub notes: String,
}

/// Body of a `membersMod` POST. Exactly one of the two lists is populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberModRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additions: Vec<Member>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deletions: Vec<Member>,
}
