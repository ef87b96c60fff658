//! Snowflake connector implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use usernaut_connector::config::{BackendConfig, HttpClientConfig};
use usernaut_connector::error::{ConnectorError, ConnectorResult};
use usernaut_connector::http::HttpDoer;
use usernaut_connector::traits::Connector;
use usernaut_connector::types::{Team, User};

use crate::config::SnowflakeConfig;
use crate::pagination::LinkParser;
use crate::types::{GrantRequest, SnowflakeGrant, SnowflakeRole, SnowflakeUser, GRANTED_TO_USER};
use crate::BACKEND_TYPE;

/// Connector for the Snowflake REST API.
pub struct SnowflakeConnector {
    config: SnowflakeConfig,
    http: HttpDoer,
    links: LinkParser,
}

impl SnowflakeConnector {
    pub fn new(backend: &BackendConfig, http: &HttpClientConfig) -> ConnectorResult<Self> {
        let config: SnowflakeConfig = backend.parse_connection()?;
        config.validate()?;
        let http = HttpDoer::new(backend.instance_key(), http)?;
        Ok(Self {
            config,
            http,
            links: LinkParser::new(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http") {
            endpoint.to_string()
        } else {
            format!("{}{endpoint}", self.config.base_url)
        }
    }

    fn get(&self, endpoint: &str) -> reqwest::RequestBuilder {
        self.http
            .client()
            .get(self.url(endpoint))
            .bearer_auth(&self.config.pat)
            .header("Accept", "application/json")
    }

    fn post(&self, endpoint: &str) -> reqwest::RequestBuilder {
        self.http
            .client()
            .post(self.url(endpoint))
            .bearer_auth(&self.config.pat)
            .header("Accept", "application/json")
    }

    fn delete(&self, endpoint: &str) -> reqwest::RequestBuilder {
        self.http
            .client()
            .delete(self.url(endpoint))
            .bearer_auth(&self.config.pat)
            .header("Accept", "application/json")
    }

    /// Walk a Link-paginated listing, concatenating every page.
    async fn fetch_paginated<T: DeserializeOwned>(&self, endpoint: &str) -> ConnectorResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(endpoint.to_string());

        while let Some(endpoint) = next {
            let response = self.http.execute(self.get(&endpoint)).await?;
            if !response.is_success() {
                return Err(ConnectorError::UnexpectedStatus {
                    status: response.status,
                    body: response.body,
                });
            }

            let page: Vec<T> = response.json()?;
            items.extend(page);

            next = response
                .header("Link")
                .and_then(|header| self.links.rel(header, "next"));
            if next.is_some() {
                debug!(endpoint = %endpoint, "following Link rel=\"next\"");
            }
        }

        Ok(items)
    }

    async fn modify_grants(
        &self,
        team_id: &str,
        user_ids: &[String],
        revoke: bool,
    ) -> ConnectorResult<()> {
        for user_id in user_ids {
            let endpoint = if revoke {
                format!("/api/v2/users/{user_id}/grants:revoke")
            } else {
                format!("/api/v2/users/{user_id}/grants")
            };

            let response = self
                .http
                .execute(self.post(&endpoint).json(&GrantRequest::role(team_id)))
                .await?;

            if !response.is_success() {
                return Err(ConnectorError::UnexpectedStatus {
                    status: response.status,
                    body: response.body,
                });
            }
        }
        Ok(())
    }
}

fn to_user(user: SnowflakeUser) -> User {
    let name = user.name.to_lowercase();
    User {
        id: name.clone(),
        username: name,
        email: user.email.to_lowercase(),
        first_name: user.first_name,
        last_name: user.last_name,
        display_name: user.display_name,
        role: String::new(),
    }
}

#[async_trait]
impl Connector for SnowflakeConnector {
    fn backend_type(&self) -> &str {
        BACKEND_TYPE
    }

    async fn fetch_all_users(
        &self,
    ) -> ConnectorResult<(HashMap<String, User>, HashMap<String, User>)> {
        let users: Vec<SnowflakeUser> = self.fetch_paginated("/api/v2/users").await?;

        let mut by_id = HashMap::with_capacity(users.len());
        let mut by_email = HashMap::with_capacity(users.len());
        for user in users {
            let user = to_user(user);
            by_email.insert(user.email.clone(), user.clone());
            by_id.insert(user.id.clone(), user);
        }
        Ok((by_id, by_email))
    }

    async fn fetch_user_details(&self, user_id: &str) -> ConnectorResult<User> {
        let response = self
            .http
            .execute(self.get(&format!("/api/v2/users/{user_id}")))
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

        let user: SnowflakeUser = response.json()?;
        Ok(to_user(user))
    }

    async fn create_user(&self, user: &User) -> ConnectorResult<User> {
        let name = user.username.to_lowercase();
        info!(user = %name, "creating warehouse user");

        let body = SnowflakeUser {
            name: name.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        };

        let response = self
            .http
            .execute(self.post("/api/v2/users").json(&body))
            .await?;

        if response.status == 409 {
            return Err(ConnectorError::AlreadyExists { identifier: name });
        }
        if !response.is_success() {
            return Err(ConnectorError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }

        // The user name is the identifier; Snowflake assigns nothing else.
        let mut created = user.clone();
        created.id = name;
        Ok(created)
    }

    async fn delete_user(&self, user_id: &str) -> ConnectorResult<()> {
        info!(user_id, "dropping warehouse user");
        let response = self
            .http
            .execute(self.delete(&format!("/api/v2/users/{user_id}")))
            .await?;

        if !response.is_success() && response.status != 404 {
            return Err(ConnectorError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }
        Ok(())
    }

    async fn fetch_all_teams(&self) -> ConnectorResult<HashMap<String, Team>> {
        let roles: Vec<SnowflakeRole> = self.fetch_paginated("/api/v2/roles").await?;

        let mut by_name = HashMap::with_capacity(roles.len());
        for role in roles {
            let name = role.name.to_lowercase();
            by_name.insert(
                name.clone(),
                Team {
                    id: name.clone(),
                    name,
                    description: role.comment,
                    role: String::new(),
                },
            );
        }
        Ok(by_name)
    }

    async fn fetch_team_details(&self, team_id: &str) -> ConnectorResult<Team> {
        let teams = self.fetch_all_teams().await?;
        teams
            .get(&team_id.to_lowercase())
            .cloned()
            .ok_or_else(|| ConnectorError::NotFound {
                identifier: team_id.to_string(),
            })
    }

    async fn create_team(&self, team: &Team) -> ConnectorResult<Team> {
        let name = team.name.to_lowercase();
        info!(role = %name, "creating warehouse role");

        let body = SnowflakeRole {
            name: name.clone(),
            comment: team.description.clone(),
        };

        let response = self
            .http
            .execute(self.post("/api/v2/roles").json(&body))
            .await?;

        if response.status == 409 {
            return Err(ConnectorError::AlreadyExists { identifier: name });
        }
        if !response.is_success() {
            return Err(ConnectorError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }

        Ok(Team {
            id: name.clone(),
            name,
            description: team.description.clone(),
            role: String::new(),
        })
    }

    async fn delete_team_by_id(&self, team_id: &str) -> ConnectorResult<()> {
        info!(team_id, "dropping warehouse role");
        let response = self
            .http
            .execute(self.delete(&format!("/api/v2/roles/{team_id}")))
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
        let response = self
            .http
            .execute(self.get(&format!("/api/v2/roles/{team_id}/grants-of")))
            .await?;

        if !response.is_success() {
            return Err(ConnectorError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }

        let grants: Vec<SnowflakeGrant> = response.json()?;

        let mut members = HashMap::new();
        for grant in grants {
            // Only user grants count; role-to-role grants are hierarchy.
            if grant.granted_to != GRANTED_TO_USER || grant.grantee_name.is_empty() {
                continue;
            }
            let name = grant.grantee_name.to_lowercase();
            members.insert(
                name.clone(),
                User {
                    id: name.clone(),
                    username: name,
                    ..Default::default()
                },
            );
        }
        Ok(members)
    }

    async fn add_user_to_team(&self, team_id: &str, user_ids: &[String]) -> ConnectorResult<()> {
        info!(team_id, count = user_ids.len(), "granting role to users");
        self.modify_grants(team_id, user_ids, false).await
    }

    async fn remove_user_from_team(
        &self,
        team_id: &str,
        user_ids: &[String],
    ) -> ConnectorResult<()> {
        info!(team_id, count = user_ids.len(), "revoking role from users");
        self.modify_grants(team_id, user_ids, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn connector(server: &MockServer) -> SnowflakeConnector {
        let backend = BackendConfig {
            name: "dwh".to_string(),
            backend_type: "snowflake".to_string(),
            enabled: true,
            connection: json!({
                "pat": "token",
                "base_url": server.uri()
            })
            .as_object()
            .cloned()
            .unwrap_or_default(),
        };
        SnowflakeConnector::new(&backend, &HttpClientConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_users_follow_link_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/users"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"name": "ALICE", "email": "ALICE@EXAMPLE.COM"}]))
                    .insert_header("Link", r#"</api/v2/users2>; rel="next""#),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/users2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"name": "BOB", "email": "bob@example.com"}])),
            )
            .mount(&server)
            .await;

        let connector = connector(&server).await;
        let (by_id, by_email) = connector.fetch_all_users().await.unwrap();

        assert_eq!(by_id.len(), 2);
        assert!(by_id.contains_key("alice"));
        assert!(by_email.contains_key("alice@example.com"));
    }

    #[tokio::test]
    async fn test_members_filtered_to_users_and_lowercased() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/roles/data_platform/grants-of"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"granted_to": "USER", "grantee_name": "ALICE"},
                {"granted_to": "ROLE", "grantee_name": "SYSADMIN"},
                {"granted_to": "USER", "grantee_name": "Bob"}
            ])))
            .mount(&server)
            .await;

        let connector = connector(&server).await;
        let members = connector
            .fetch_team_members_by_team_id("data_platform")
            .await
            .unwrap();

        assert_eq!(members.len(), 2);
        assert!(members.contains_key("alice"));
        assert!(members.contains_key("bob"));
    }

    #[tokio::test]
    async fn test_create_team_conflict_is_already_exists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/roles"))
            .respond_with(ResponseTemplate::new(409).set_body_string("role exists"))
            .mount(&server)
            .await;

        let connector = connector(&server).await;
        let err = connector
            .create_team(&Team::named("Data_Platform"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ConnectorError::AlreadyExists { ref identifier } if identifier == "data_platform")
        );
    }

    #[tokio::test]
    async fn test_add_user_grants_role_per_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/users/alice/grants"))
            .and(body_json(json!({
                "securable": {"name": "data_platform"},
                "securable_type": "ROLE"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/users/bob/grants"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let connector = connector(&server).await;
        connector
            .add_user_to_team("data_platform", &["alice".to_string(), "bob".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_user_revokes_role() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/users/alice/grants:revoke"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let connector = connector(&server).await;
        connector
            .remove_user_from_team("data_platform", &["alice".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_user_lowercases_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        let connector = connector(&server).await;
        let created = connector
            .create_user(&User {
                username: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.id, "alice");
    }
}
