//! Connector capability set.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ConnectorResult;
use crate::types::{Team, User};

/// Uniform operations for users, teams and memberships against one backend
/// instance.
///
/// Implementations canonicalize identifiers (lowercase) at the boundary
/// unless the backend is case-sensitive by contract, and filter membership
/// listings to user-type principals.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The backend type this connector talks to, e.g. `fivetran`.
    fn backend_type(&self) -> &str;

    /// Complete user snapshot, indexed by backend id and by email.
    async fn fetch_all_users(
        &self,
    ) -> ConnectorResult<(HashMap<String, User>, HashMap<String, User>)>;

    /// Details for one user by backend id.
    async fn fetch_user_details(&self, user_id: &str) -> ConnectorResult<User>;

    /// Onboard a user; the returned user carries the backend-assigned id.
    async fn create_user(&self, user: &User) -> ConnectorResult<User>;

    /// Remove a user from the backend.
    async fn delete_user(&self, user_id: &str) -> ConnectorResult<()>;

    /// All teams, indexed by name.
    async fn fetch_all_teams(&self) -> ConnectorResult<HashMap<String, Team>>;

    /// Details for one team by id.
    async fn fetch_team_details(&self, team_id: &str) -> ConnectorResult<Team>;

    /// Create a team. Must be idempotent against "already exists": when the
    /// backend reports a conflict the call succeeds with the logical id set
    /// to the requested name.
    async fn create_team(&self, team: &Team) -> ConnectorResult<Team>;

    /// Tear down a team by id.
    async fn delete_team_by_id(&self, team_id: &str) -> ConnectorResult<()>;

    /// Current team membership keyed by backend-native user id.
    async fn fetch_team_members_by_team_id(
        &self,
        team_id: &str,
    ) -> ConnectorResult<HashMap<String, User>>;

    /// Add the given users to a team. Batch; may fan out internally.
    async fn add_user_to_team(&self, team_id: &str, user_ids: &[String]) -> ConnectorResult<()>;

    /// Remove the given users from a team. Batch; may fan out internally.
    async fn remove_user_from_team(&self, team_id: &str, user_ids: &[String])
        -> ConnectorResult<()>;
}

impl std::fmt::Debug for dyn Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("backend_type", &self.backend_type())
            .finish()
    }
}
