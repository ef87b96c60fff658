//! Hand-rolled fakes shared by the controller tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;

use usernaut_connector::error::{ConnectorError, ConnectorResult};
use usernaut_connector::traits::Connector;
use usernaut_connector::types::{Team, User};
use usernaut_directory::{Directory, DirectoryError, DirectoryResult};

use crate::group::{Group, GroupMembers, GroupSpec};
use crate::store::{GroupStore, StoreResult};

/// Build a namespaced group with a uid and generation, as the cluster would.
pub(crate) fn make_group(name: &str, users: &[&str], groups: &[&str]) -> Group {
    let mut group = Group::new(
        name,
        GroupSpec {
            group_name: name.to_string(),
            members: GroupMembers {
                users: users.iter().map(ToString::to_string).collect(),
                groups: groups.iter().map(ToString::to_string).collect(),
            },
            backends: vec![],
        },
    );
    group.metadata.namespace = Some("default".to_string());
    group.metadata.uid = Some(format!("uid-{name}"));
    group.metadata.generation = Some(1);
    group
}

/// In-memory cluster store.
#[derive(Default)]
pub(crate) struct InMemoryGroupStore {
    groups: RwLock<HashMap<(String, String), Group>>,
}

impl InMemoryGroupStore {
    pub(crate) async fn insert(&self, group: Group) {
        let namespace = group.metadata.namespace.clone().unwrap_or_default();
        let name = group.metadata.name.clone().unwrap_or_default();
        self.groups.write().await.insert((namespace, name), group);
    }

    pub(crate) async fn stored(&self, namespace: &str, name: &str) -> Option<Group> {
        self.groups
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

#[async_trait]
impl GroupStore for InMemoryGroupStore {
    async fn get(&self, namespace: &str, name: &str) -> StoreResult<Option<Group>> {
        Ok(self
            .groups
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn list(&self, namespace: &str) -> StoreResult<Vec<Group>> {
        Ok(self
            .groups
            .read()
            .await
            .values()
            .filter(|g| g.metadata.namespace.as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    async fn update_metadata(&self, group: &Group) -> StoreResult<()> {
        let namespace = group.metadata.namespace.clone().unwrap_or_default();
        let name = group.metadata.name.clone().unwrap_or_default();
        let mut groups = self.groups.write().await;
        if let Some(stored) = groups.get_mut(&(namespace, name)) {
            stored.metadata.finalizers = group.metadata.finalizers.clone();
            stored.metadata.owner_references = group.metadata.owner_references.clone();
        }
        Ok(())
    }

    async fn update_status(&self, group: &Group) -> StoreResult<()> {
        let namespace = group.metadata.namespace.clone().unwrap_or_default();
        let name = group.metadata.name.clone().unwrap_or_default();
        let mut groups = self.groups.write().await;
        if let Some(stored) = groups.get_mut(&(namespace, name)) {
            stored.status = group.status.clone();
        }
        Ok(())
    }
}

/// Scripted directory responses.
#[derive(Clone)]
pub(crate) enum DirectoryReply {
    Found(HashMap<String, String>),
    NotFound,
    Transport,
}

/// Directory fake replaying a per-user queue of replies; the last reply
/// repeats once the queue drains.
#[derive(Default)]
pub(crate) struct MockDirectory {
    replies: Mutex<HashMap<String, VecDeque<DirectoryReply>>>,
}

impl MockDirectory {
    pub(crate) fn with_user(self, user_id: &str, email: &str) -> Self {
        let mut attrs = HashMap::new();
        attrs.insert("uid".to_string(), user_id.to_string());
        attrs.insert("cn".to_string(), format!("{user_id} cn"));
        attrs.insert("sn".to_string(), format!("{user_id}-sn"));
        attrs.insert("displayName".to_string(), format!("{user_id} display"));
        attrs.insert("mail".to_string(), email.to_string());
        self.push(user_id, DirectoryReply::Found(attrs));
        self
    }

    pub(crate) fn with_missing_user(self, user_id: &str) -> Self {
        self.push(user_id, DirectoryReply::NotFound);
        self
    }

    pub(crate) fn with_transport_error(self, user_id: &str) -> Self {
        self.push(user_id, DirectoryReply::Transport);
        self
    }

    fn push(&self, user_id: &str, reply: DirectoryReply) {
        self.replies
            .lock()
            .expect("directory replies poisoned")
            .entry(user_id.to_string())
            .or_default()
            .push_back(reply);
    }
}

#[async_trait]
impl Directory for MockDirectory {
    async fn user_attributes(&self, user_id: &str) -> DirectoryResult<HashMap<String, String>> {
        let mut replies = self.replies.lock().expect("directory replies poisoned");
        let queue = replies
            .get_mut(user_id)
            .ok_or_else(|| DirectoryError::UserNotFound {
                user_id: user_id.to_string(),
            })?;

        let reply = if queue.len() > 1 {
            queue.pop_front().expect("queue checked non-empty")
        } else {
            queue
                .front()
                .cloned()
                .ok_or_else(|| DirectoryError::UserNotFound {
                    user_id: user_id.to_string(),
                })?
        };

        match reply {
            DirectoryReply::Found(attrs) => Ok(attrs),
            DirectoryReply::NotFound => Err(DirectoryError::UserNotFound {
                user_id: user_id.to_string(),
            }),
            DirectoryReply::Transport => Err(DirectoryError::connection("scripted transport error")),
        }
    }
}

/// Recording connector fake.
///
/// Team creation assigns `team-<name>` ids and user creation assigns
/// `id-<username>` ids so tests can assert on the identity translation.
#[derive(Default)]
pub(crate) struct MockConnector {
    pub calls: Mutex<Vec<String>>,
    pub members: Mutex<HashMap<String, User>>,
    pub fail_fetch_members: AtomicBool,
    pub fail_delete_user: AtomicBool,
}

impl MockConnector {
    pub(crate) fn recorded(&self) -> Vec<String> {
        self.calls.lock().expect("calls poisoned").clone()
    }

    pub(crate) fn calls_matching(&self, prefix: &str) -> usize {
        self.recorded()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub(crate) fn set_members(&self, ids: &[&str]) {
        let mut members = self.members.lock().expect("members poisoned");
        members.clear();
        for id in ids {
            members.insert((*id).to_string(), User::with_id(*id));
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls poisoned").push(call);
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn backend_type(&self) -> &str {
        "mock"
    }

    async fn fetch_all_users(
        &self,
    ) -> ConnectorResult<(HashMap<String, User>, HashMap<String, User>)> {
        Ok((HashMap::new(), HashMap::new()))
    }

    async fn fetch_user_details(&self, user_id: &str) -> ConnectorResult<User> {
        Ok(User::with_id(user_id))
    }

    async fn create_user(&self, user: &User) -> ConnectorResult<User> {
        self.record(format!("create_user:{}", user.username));
        let mut created = user.clone();
        created.id = format!("id-{}", user.username);
        Ok(created)
    }

    async fn delete_user(&self, user_id: &str) -> ConnectorResult<()> {
        if self.fail_delete_user.load(Ordering::SeqCst) {
            return Err(ConnectorError::UnexpectedStatus {
                status: 500,
                body: "scripted delete failure".to_string(),
            });
        }
        self.record(format!("delete_user:{user_id}"));
        Ok(())
    }

    async fn fetch_all_teams(&self) -> ConnectorResult<HashMap<String, Team>> {
        Ok(HashMap::new())
    }

    async fn fetch_team_details(&self, team_id: &str) -> ConnectorResult<Team> {
        Ok(Team::named(team_id))
    }

    async fn create_team(&self, team: &Team) -> ConnectorResult<Team> {
        self.record(format!("create_team:{}", team.name));
        let mut created = team.clone();
        created.id = format!("team-{}", team.name);
        Ok(created)
    }

    async fn delete_team_by_id(&self, team_id: &str) -> ConnectorResult<()> {
        self.record(format!("delete_team:{team_id}"));
        Ok(())
    }

    async fn fetch_team_members_by_team_id(
        &self,
        team_id: &str,
    ) -> ConnectorResult<HashMap<String, User>> {
        if self.fail_fetch_members.load(Ordering::SeqCst) {
            return Err(ConnectorError::UnexpectedStatus {
                status: 500,
                body: "scripted failure".to_string(),
            });
        }
        self.record(format!("fetch_members:{team_id}"));
        Ok(self.members.lock().expect("members poisoned").clone())
    }

    async fn add_user_to_team(&self, team_id: &str, user_ids: &[String]) -> ConnectorResult<()> {
        let mut sorted = user_ids.to_vec();
        sorted.sort();
        self.record(format!("add:{team_id}:{}", sorted.join(",")));
        Ok(())
    }

    async fn remove_user_from_team(
        &self,
        team_id: &str,
        user_ids: &[String],
    ) -> ConnectorResult<()> {
        let mut sorted = user_ids.to_vec();
        sorted.sort();
        self.record(format!("remove:{team_id}:{}", sorted.join(",")));
        Ok(())
    }
}
