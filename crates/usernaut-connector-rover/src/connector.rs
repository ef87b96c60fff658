//! Rover connector implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{info, warn};

use usernaut_connector::config::{BackendConfig, HttpClientConfig};
use usernaut_connector::error::{ConnectorError, ConnectorResult};
use usernaut_connector::http::HttpDoer;
use usernaut_connector::traits::Connector;
use usernaut_connector::types::{Team, User};

use crate::config::RoverConfig;
use crate::types::{
    Member, MemberModRequest, RoverGroup, MEMBER_APPROVAL_SELF_SERVICE, MEMBER_TYPE_SERVICE_ACCOUNT,
    MEMBER_TYPE_USER,
};
use crate::BACKEND_TYPE;

/// Connector for the rover group service.
pub struct RoverConnector {
    config: RoverConfig,
    http: HttpDoer,
}

impl RoverConnector {
    pub fn new(backend: &BackendConfig, http: &HttpClientConfig) -> ConnectorResult<Self> {
        let config: RoverConfig = backend.parse_connection()?;
        config.validate()?;
        let http = HttpDoer::new(backend.instance_key(), http)?;
        Ok(Self { config, http })
    }

    fn group_url(&self, team_id: &str) -> String {
        format!("{}/v1/groups/{team_id}", self.config.url)
    }

    async fn modify_members(
        &self,
        team_id: &str,
        request: &MemberModRequest,
    ) -> ConnectorResult<()> {
        let url = format!("{}/v1/groups/{team_id}/membersMod", self.config.url);
        let response = self
            .http
            .execute(
                self.http
                    .client()
                    .post(&url)
                    .bearer_auth(&self.config.token)
                    .json(request),
            )
            .await?;

        if !response.is_success() {
            return Err(ConnectorError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for RoverConnector {
    fn backend_type(&self) -> &str {
        BACKEND_TYPE
    }

    async fn fetch_all_users(
        &self,
    ) -> ConnectorResult<(HashMap<String, User>, HashMap<String, User>)> {
        // Rover is the directory; there is no separate user inventory.
        Ok((HashMap::new(), HashMap::new()))
    }

    async fn fetch_user_details(&self, user_id: &str) -> ConnectorResult<User> {
        Ok(User::with_id(user_id))
    }

    async fn create_user(&self, user: &User) -> ConnectorResult<User> {
        // Users already exist in the directory; the username is the id.
        Ok(User::with_id(user.username.clone()))
    }

    async fn delete_user(&self, _user_id: &str) -> ConnectorResult<()> {
        Ok(())
    }

    async fn fetch_all_teams(&self) -> ConnectorResult<HashMap<String, Team>> {
        // The group name is the unique identifier; a full listing is never needed.
        Ok(HashMap::new())
    }

    async fn fetch_team_details(&self, _team_id: &str) -> ConnectorResult<Team> {
        Err(ConnectorError::Unsupported {
            operation: "fetch_team_details".to_string(),
        })
    }

    async fn create_team(&self, team: &Team) -> ConnectorResult<Team> {
        info!(group = %team.name, "creating rover group");

        let group = RoverGroup {
            name: team.name.clone(),
            description: team.description.clone(),
            member_approval_type: MEMBER_APPROVAL_SELF_SERVICE.to_string(),
            owners: vec![Member {
                id: self.config.service_account_name.clone(),
                member_type: MEMBER_TYPE_SERVICE_ACCOUNT.to_string(),
            }],
            members: vec![],
            contact_list: self.config.contact_email.clone(),
            notes: "Created by Usernaut".to_string(),
        };

        let url = format!("{}/v1/groups", self.config.url);
        let response = self
            .http
            .execute(
                self.http
                    .client()
                    .post(&url)
                    .bearer_auth(&self.config.token)
                    .json(&group),
            )
            .await?;

        // The API answers 403 when the group already exists; the group name
        // is its id, so this converges to success.
        if response.status == 403 {
            warn!(group = %team.name, "rover group already exists");
            return Ok(Team {
                id: team.name.clone(),
                name: team.name.clone(),
                description: team.description.clone(),
                role: String::new(),
            });
        }

        if response.status != 201 {
            return Err(ConnectorError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }

        Ok(Team {
            id: team.name.clone(),
            name: team.name.clone(),
            description: team.description.clone(),
            role: String::new(),
        })
    }

    async fn delete_team_by_id(&self, team_id: &str) -> ConnectorResult<()> {
        let response = self
            .http
            .execute(
                self.http
                    .client()
                    .delete(self.group_url(team_id))
                    .bearer_auth(&self.config.token),
            )
            .await?;

        // A group that is already gone is a successful teardown.
        if !response.is_success() && response.status != 404 {
            return Err(ConnectorError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }
        Ok(())
    }

    async fn fetch_team_members_by_team_id(
        &self,
        team_id: &str,
    ) -> ConnectorResult<HashMap<String, User>> {
        let response = self
            .http
            .execute(
                self.http
                    .client()
                    .get(self.group_url(team_id))
                    .bearer_auth(&self.config.token),
            )
            .await?;

        if !response.is_success() {
            return Err(ConnectorError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }

        let group: RoverGroup = response.json()?;

        let mut members = HashMap::new();
        for member in group.members {
            // Service accounts co-own groups but are not managed membership.
            if member.member_type != MEMBER_TYPE_USER {
                continue;
            }
            members.insert(member.id.clone(), User::with_id(member.id));
        }
        Ok(members)
    }

    async fn add_user_to_team(&self, team_id: &str, user_ids: &[String]) -> ConnectorResult<()> {
        info!(team_id, count = user_ids.len(), "adding users to rover group");
        let request = MemberModRequest {
            additions: user_ids
                .iter()
                .map(|id| Member {
                    id: id.clone(),
                    member_type: MEMBER_TYPE_USER.to_string(),
                })
                .collect(),
            deletions: vec![],
        };
        self.modify_members(team_id, &request).await
    }

    async fn remove_user_from_team(
        &self,
        team_id: &str,
        user_ids: &[String],
    ) -> ConnectorResult<()> {
        info!(team_id, count = user_ids.len(), "removing users from rover group");
        let request = MemberModRequest {
            additions: vec![],
            deletions: user_ids
                .iter()
                .map(|id| Member {
                    id: id.clone(),
                    member_type: MEMBER_TYPE_USER.to_string(),
                })
                .collect(),
        };
        self.modify_members(team_id, &request).await
    }
}
