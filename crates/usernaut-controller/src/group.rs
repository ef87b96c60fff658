//! The `Group` custom resource.

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finalizer gating group deletion until backend teardown completes.
pub const FINALIZER: &str = "usernaut.dev/finalizer";

/// Condition type reporting overall reconcile health.
pub const GROUP_READY_CONDITION: &str = "GroupReadyCondition";

/// `apiVersion` of the Group kind, used in owner references.
pub const GROUP_API_VERSION: &str = "usernaut.dev/v1alpha1";

/// Kind name, used in owner references.
pub const GROUP_KIND: &str = "Group";

/// Desired state of a Group.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "usernaut.dev",
    version = "v1alpha1",
    kind = "Group",
    namespaced,
    status = "GroupStatus",
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.conditions[?(@.type==\"GroupReadyCondition\")].status"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.conditions[?(@.type==\"GroupReadyCondition\")].message"}"#
)]
pub struct GroupSpec {
    /// Logical group identifier; backend team names derive from it.
    pub group_name: String,

    #[serde(default)]
    pub members: GroupMembers,

    /// Backends this group converges to.
    #[serde(default)]
    pub backends: Vec<BackendRef>,
}

/// Direct members of a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GroupMembers {
    /// Directory user ids.
    #[serde(default)]
    pub users: Vec<String>,

    /// Names of sibling Groups in the same namespace; forms a DAG.
    #[serde(default)]
    pub groups: Vec<String>,
}

/// One declared backend target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct BackendRef {
    pub name: String,

    #[serde(rename = "type")]
    pub backend_type: String,
}

impl BackendRef {
    /// The `<name>_<type>` key identifying this backend in cache mappings.
    #[must_use]
    pub fn instance_key(&self) -> String {
        format!("{}_{}", self.name, self.backend_type)
    }
}

/// Observed state of a Group.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GroupStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Generation last reconciled with every backend successful.
    #[serde(default, rename = "lastAppliedGeneration")]
    pub last_applied_generation: i64,

    /// Deduplicated transitively-expanded member list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,

    /// Per-backend convergence outcome of the last reconcile.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backends: Vec<BackendStatus>,
}

/// Convergence outcome for one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BackendStatus {
    pub name: String,

    #[serde(rename = "type")]
    pub backend_type: String,

    pub ok: bool,

    #[serde(default)]
    pub message: String,
}

impl Group {
    /// Whether a deletion timestamp is set.
    #[must_use]
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Whether the usernaut finalizer is present.
    #[must_use]
    pub fn has_finalizer(&self) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|finalizers| finalizers.iter().any(|f| f == FINALIZER))
    }

    /// Replace the `GroupReadyCondition`, stamping the transition time and
    /// observed generation.
    pub fn set_ready_condition(&mut self, status: &str, reason: &str, message: &str) {
        let condition = Condition {
            last_transition_time: Time(Utc::now()),
            message: message.to_string(),
            observed_generation: self.metadata.generation,
            reason: reason.to_string(),
            status: status.to_string(),
            type_: GROUP_READY_CONDITION.to_string(),
        };

        let status = self.status.get_or_insert_with(GroupStatus::default);
        status.conditions.retain(|c| c.type_ != GROUP_READY_CONDITION);
        status.conditions.push(condition);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str) -> Group {
        let mut group = Group::new(
            name,
            GroupSpec {
                group_name: name.to_string(),
                members: GroupMembers::default(),
                backends: vec![],
            },
        );
        group.metadata.namespace = Some("default".to_string());
        group
    }

    #[test]
    fn test_spec_field_names() {
        let raw = serde_json::json!({
            "group_name": "data-platform",
            "members": {
                "users": ["alice", "bob"],
                "groups": ["child"]
            },
            "backends": [{"name": "prod", "type": "fivetran"}]
        });
        let spec: GroupSpec = serde_json::from_value(raw).unwrap();
        assert_eq!(spec.group_name, "data-platform");
        assert_eq!(spec.members.users.len(), 2);
        assert_eq!(spec.backends[0].instance_key(), "prod_fivetran");
    }

    #[test]
    fn test_finalizer_detection() {
        let mut g = group("a");
        assert!(!g.has_finalizer());

        g.metadata.finalizers = Some(vec![FINALIZER.to_string()]);
        assert!(g.has_finalizer());

        g.metadata.finalizers = Some(vec!["other/finalizer".to_string()]);
        assert!(!g.has_finalizer());
    }

    #[test]
    fn test_ready_condition_replaced_not_duplicated() {
        let mut g = group("a");
        g.set_ready_condition("Unknown", "Reconciling", "Waiting");
        g.set_ready_condition("True", "ReconcileSucceeded", "Successful");

        let status = g.status.as_ref().unwrap();
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].status, "True");
    }

    #[test]
    fn test_status_serialization_field_names() {
        let status = GroupStatus {
            conditions: vec![],
            last_applied_generation: 3,
            users: vec!["alice".to_string()],
            backends: vec![BackendStatus {
                name: "prod".to_string(),
                backend_type: "fivetran".to_string(),
                ok: true,
                message: "Successful".to_string(),
            }],
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["lastAppliedGeneration"], 3);
        assert_eq!(json["backends"][0]["type"], "fivetran");
    }
}
