//! Fivetran connector implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use usernaut_connector::config::{BackendConfig, HttpClientConfig};
use usernaut_connector::error::{ConnectorError, ConnectorResult};
use usernaut_connector::http::HttpDoer;
use usernaut_connector::traits::Connector;
use usernaut_connector::types::{Team, User};

use crate::config::FivetranConfig;
use crate::types::{
    AddMembershipRequest, Envelope, FivetranTeam, FivetranUser, InviteUserRequest, Page,
    TeamMembership,
};
use crate::{BACKEND_TYPE, TEAM_MEMBER_ROLE};

/// Maximum concurrent per-user membership operations.
const MAX_CONCURRENT_USERS: usize = 10;

enum MembershipAction {
    Add,
    Remove,
}

/// Connector for the Fivetran REST API.
pub struct FivetranConnector {
    config: Arc<FivetranConfig>,
    http: Arc<HttpDoer>,
}

impl FivetranConnector {
    pub fn new(backend: &BackendConfig, http: &HttpClientConfig) -> ConnectorResult<Self> {
        let config: FivetranConfig = backend.parse_connection()?;
        config.validate()?;
        let http = HttpDoer::new(backend.instance_key(), http)?;
        Ok(Self {
            config: Arc::new(config),
            http: Arc::new(http),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.config.base_url)
    }

    /// Walk a cursor-paginated listing until `next_cursor` runs out.
    async fn fetch_paged<T: DeserializeOwned>(&self, endpoint: &str) -> ConnectorResult<Vec<T>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .http
                .client()
                .get(self.url(endpoint))
                .basic_auth(&self.config.api_key, Some(&self.config.api_secret));
            if let Some(cursor) = &cursor {
                request = request.query(&[("cursor", cursor.as_str())]);
            }

            let response = self.http.execute(request).await?;
            if !response.is_success() {
                return Err(ConnectorError::UnexpectedStatus {
                    status: response.status,
                    body: response.body,
                });
            }

            let envelope: Envelope<Page<T>> = response.json()?;
            items.extend(envelope.data.items);

            cursor = envelope.data.next_cursor.filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
            debug!(endpoint, "following next_cursor");
        }

        Ok(items)
    }

    async fn membership_call(
        http: &HttpDoer,
        config: &FivetranConfig,
        action: &MembershipAction,
        team_id: &str,
        user_id: &str,
    ) -> ConnectorResult<()> {
        let response = match action {
            MembershipAction::Add => {
                let body = AddMembershipRequest {
                    user_id: user_id.to_string(),
                    role: TEAM_MEMBER_ROLE.to_string(),
                };
                http.execute(
                    http.client()
                        .post(format!("{}/v1/teams/{team_id}/users", config.base_url))
                        .basic_auth(&config.api_key, Some(&config.api_secret))
                        .json(&body),
                )
                .await?
            }
            MembershipAction::Remove => {
                http.execute(
                    http.client()
                        .delete(format!(
                            "{}/v1/teams/{team_id}/users/{user_id}",
                            config.base_url
                        ))
                        .basic_auth(&config.api_key, Some(&config.api_secret)),
                )
                .await?
            }
        };

        if !response.is_success() {
            return Err(ConnectorError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }
        Ok(())
    }

    /// Fan membership changes out per user with bounded concurrency,
    /// aggregating per-user failures.
    async fn modify_membership(
        &self,
        action: MembershipAction,
        team_id: &str,
        user_ids: &[String],
    ) -> ConnectorResult<()> {
        let action = Arc::new(action);
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_USERS));
        let mut tasks: JoinSet<(String, ConnectorResult<()>)> = JoinSet::new();

        for user_id in user_ids {
            let action = Arc::clone(&action);
            let semaphore = Arc::clone(&semaphore);
            let http = Arc::clone(&self.http);
            let config = Arc::clone(&self.config);
            let team_id = team_id.to_string();
            let user_id = user_id.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result =
                    Self::membership_call(&http, &config, &action, &team_id, &user_id).await;
                (user_id, result)
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((user_id, Err(e))) => failures.push(format!("{user_id}: {e}")),
                Err(e) => failures.push(format!("membership task panicked: {e}")),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            failures.sort();
            Err(ConnectorError::Batch { failures })
        }
    }
}

#[async_trait]
impl Connector for FivetranConnector {
    fn backend_type(&self) -> &str {
        BACKEND_TYPE
    }

    async fn fetch_all_users(
        &self,
    ) -> ConnectorResult<(HashMap<String, User>, HashMap<String, User>)> {
        let users: Vec<FivetranUser> = self.fetch_paged("/v1/users").await?;

        let mut by_id = HashMap::with_capacity(users.len());
        let mut by_email = HashMap::with_capacity(users.len());
        for user in users {
            let user: User = user.into();
            by_email.insert(user.email.clone(), user.clone());
            by_id.insert(user.id.clone(), user);
        }
        Ok((by_id, by_email))
    }

    async fn fetch_user_details(&self, user_id: &str) -> ConnectorResult<User> {
        let response = self
            .http
            .execute(
                self.http
                    .client()
                    .get(self.url(&format!("/v1/users/{user_id}")))
                    .basic_auth(&self.config.api_key, Some(&self.config.api_secret)),
            )
            .await?;

        if response.status == 404 {
            return Err(ConnectorError::NotFound {
                identifier: user_id.to_string(),
            });
        }
        if !response.is_success() {
            return Err(ConnectorError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }

        let envelope: Envelope<FivetranUser> = response.json()?;
        Ok(envelope.data.into())
    }

    async fn create_user(&self, user: &User) -> ConnectorResult<User> {
        info!(email = %user.email, "inviting user");

        let body = InviteUserRequest {
            email: user.email.clone(),
            given_name: user.first_name.clone(),
            family_name: user.last_name.clone(),
            role: user.role.clone(),
        };

        let response = self
            .http
            .execute(
                self.http
                    .client()
                    .post(self.url("/v1/users"))
                    .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
                    .json(&body),
            )
            .await?;

        if response.status == 409 {
            return Err(ConnectorError::AlreadyExists {
                identifier: user.email.clone(),
            });
        }
        if !response.is_success() {
            return Err(ConnectorError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }

        let envelope: Envelope<FivetranUser> = response.json()?;
        Ok(envelope.data.into())
    }

    async fn delete_user(&self, user_id: &str) -> ConnectorResult<()> {
        info!(user_id, "deleting user");
        let response = self
            .http
            .execute(
                self.http
                    .client()
                    .delete(self.url(&format!("/v1/users/{user_id}")))
                    .basic_auth(&self.config.api_key, Some(&self.config.api_secret)),
            )
            .await?;

        // A user that is already gone is a successful offboarding.
        if !response.is_success() && response.status != 404 {
            return Err(ConnectorError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }
        Ok(())
    }

    async fn fetch_all_teams(&self) -> ConnectorResult<HashMap<String, Team>> {
        let teams: Vec<FivetranTeam> = self.fetch_paged("/v1/teams").await?;

        let mut by_name = HashMap::with_capacity(teams.len());
        for team in teams {
            by_name.insert(
                team.name.clone(),
                Team {
                    id: team.id,
                    name: team.name,
                    description: team.description,
                    role: team.role,
                },
            );
        }
        Ok(by_name)
    }

    async fn fetch_team_details(&self, team_id: &str) -> ConnectorResult<Team> {
        let response = self
            .http
            .execute(
                self.http
                    .client()
                    .get(self.url(&format!("/v1/teams/{team_id}")))
                    .basic_auth(&self.config.api_key, Some(&self.config.api_secret)),
            )
            .await?;

        if response.status == 404 {
            return Err(ConnectorError::NotFound {
                identifier: team_id.to_string(),
            });
        }
        if !response.is_success() {
            return Err(ConnectorError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }

        let envelope: Envelope<FivetranTeam> = response.json()?;
        Ok(Team {
            id: envelope.data.id,
            name: envelope.data.name,
            description: envelope.data.description,
            role: envelope.data.role,
        })
    }

    async fn create_team(&self, team: &Team) -> ConnectorResult<Team> {
        info!(team = %team.name, "creating team");

        let body = FivetranTeam {
            id: String::new(),
            name: team.name.clone(),
            description: team.description.clone(),
            role: team.role.clone(),
        };

        let response = self
            .http
            .execute(
                self.http
                    .client()
                    .post(self.url("/v1/teams"))
                    .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
                    .json(&body),
            )
            .await?;

        if response.status == 409 {
            return Err(ConnectorError::AlreadyExists {
                identifier: team.name.clone(),
            });
        }
        if !response.is_success() {
            return Err(ConnectorError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }

        let envelope: Envelope<FivetranTeam> = response.json()?;
        Ok(Team {
            id: envelope.data.id,
            name: envelope.data.name,
            description: envelope.data.description,
            role: envelope.data.role,
        })
    }

    async fn delete_team_by_id(&self, team_id: &str) -> ConnectorResult<()> {
        info!(team_id, "deleting team");
        let response = self
            .http
            .execute(
                self.http
                    .client()
                    .delete(self.url(&format!("/v1/teams/{team_id}")))
                    .basic_auth(&self.config.api_key, Some(&self.config.api_secret)),
            )
            .await?;

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
        let memberships: Vec<TeamMembership> = self
            .fetch_paged(&format!("/v1/teams/{team_id}/users"))
            .await?;

        let mut members = HashMap::with_capacity(memberships.len());
        for membership in memberships {
            members.insert(
                membership.user_id.clone(),
                User {
                    id: membership.user_id,
                    role: membership.role,
                    ..Default::default()
                },
            );
        }
        Ok(members)
    }

    async fn add_user_to_team(&self, team_id: &str, user_ids: &[String]) -> ConnectorResult<()> {
        info!(team_id, count = user_ids.len(), "adding users to team");
        self.modify_membership(MembershipAction::Add, team_id, user_ids)
            .await
    }

    async fn remove_user_from_team(
        &self,
        team_id: &str,
        user_ids: &[String],
    ) -> ConnectorResult<()> {
        info!(team_id, count = user_ids.len(), "removing users from team");
        self.modify_membership(MembershipAction::Remove, team_id, user_ids)
            .await
    }
}
