//! Per-group reconciliation.
//!
//! One reconcile drives a single `(namespace, name)` toward its declared
//! state: finalizer and owner-reference upkeep, transitive member expansion,
//! directory enrichment, then per-backend convergence with failures
//! quarantined so one backend never blocks another.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use tracing::{debug, error, info, warn};

use usernaut_cache::{
    backend_instance_key, parse_backend_mapping, parse_user_list, render_backend_mapping,
    render_user_list, Cache, SharedCacheLock, USER_LIST_KEY,
};
use usernaut_connector::error::ConnectorError;
use usernaut_connector::registry::BackendRegistry;
use usernaut_connector::traits::Connector;
use usernaut_connector::transform::NameTransformer;
use usernaut_connector::types::{Team, User, DEFAULT_ROLE};
use usernaut_directory::{Directory, DirectoryUser};

use crate::error::{ReconcileError, ReconcileResult};
use crate::expand::expand_members;
use crate::group::{
    BackendRef, BackendStatus, Group, FINALIZER, GROUP_API_VERSION, GROUP_KIND,
};
use crate::store::GroupStore;

const REASON_RECONCILING: &str = "Reconciling";
const REASON_SUCCEEDED: &str = "ReconcileSucceeded";
const REASON_FAILED: &str = "ReconcileFailed";

/// Reconciles Group resources against their declared backends.
pub struct GroupReconciler {
    store: Arc<dyn GroupStore>,
    cache: Arc<dyn Cache>,
    cache_lock: SharedCacheLock,
    directory: Arc<dyn Directory>,
    registry: Arc<BackendRegistry>,
    transformer: Arc<NameTransformer>,
}

impl GroupReconciler {
    pub fn new(
        store: Arc<dyn GroupStore>,
        cache: Arc<dyn Cache>,
        cache_lock: SharedCacheLock,
        directory: Arc<dyn Directory>,
        registry: Arc<BackendRegistry>,
        transformer: Arc<NameTransformer>,
    ) -> Self {
        Self {
            store,
            cache,
            cache_lock,
            directory,
            registry,
            transformer,
        }
    }

    /// Run one reconcile for `(namespace, name)`.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> ReconcileResult<()> {
        let Some(mut group) = self.store.get(namespace, name).await? else {
            // The group is gone; the event was stale.
            debug!(namespace, name, "group not found, skipping");
            return Ok(());
        };

        // Our own status writes re-enter the watch; only a generation change
        // (or a deletion) carries new work.
        if !group.is_being_deleted() {
            let generation = group.metadata.generation;
            let last_applied = group
                .status
                .as_ref()
                .map(|status| status.last_applied_generation);
            if generation.is_some() && generation == last_applied {
                debug!(namespace, name, "generation already applied, skipping");
                return Ok(());
            }
        }

        info!(
            namespace,
            name,
            group = %group.spec.group_name,
            backends = group.spec.backends.len(),
            "reconciling group"
        );

        if group.is_being_deleted() {
            if !group.has_finalizer() {
                return Ok(());
            }
            self.teardown(&group).await?;
            if let Some(finalizers) = group.metadata.finalizers.as_mut() {
                finalizers.retain(|f| f != FINALIZER);
            }
            self.store.update_metadata(&group).await?;
            info!(namespace, name, "group teardown complete, finalizer removed");
            return Ok(());
        }

        if !group.has_finalizer() {
            group
                .metadata
                .finalizers
                .get_or_insert_with(Vec::new)
                .push(FINALIZER.to_string());
            self.store.update_metadata(&group).await?;
        }

        self.reconcile_owner_references(&mut group).await?;

        group.set_ready_condition("Unknown", REASON_RECONCILING, "Waiting");
        self.store.update_status(&group).await?;

        let expanded = expand_members(self.store.as_ref(), namespace, &group).await?;
        let directory_users = self.enrich_users(&expanded).await;

        let mut errors: BTreeMap<String, String> = BTreeMap::new();
        for backend in &group.spec.backends {
            if let Err(e) = self
                .converge_backend(backend, &group, &expanded, &directory_users)
                .await
            {
                warn!(
                    backend = %backend.name,
                    backend_type = %backend.backend_type,
                    error = %e,
                    "backend convergence failed"
                );
                errors.insert(backend.backend_type.clone(), e.to_string());
            }
        }

        self.finalize_status(&mut group, expanded, &errors).await;

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ReconcileError::BackendFailures { errors })
        }
    }

    /// Tear backing teams down across declared backends. Any failure aborts
    /// so the finalizer stays in place and the next event retries.
    async fn teardown(&self, group: &Group) -> ReconcileResult<()> {
        for backend in &group.spec.backends {
            let instance_key = backend.instance_key();
            let step = self.teardown_backend(backend, group).await;
            if let Err(e) = step {
                return Err(ReconcileError::DeletionIncomplete {
                    message: format!("backend {instance_key}: {e}"),
                });
            }
        }
        Ok(())
    }

    async fn teardown_backend(
        &self,
        backend: &BackendRef,
        group: &Group,
    ) -> ReconcileResult<()> {
        let team_name = self
            .transformer
            .transform(&backend.backend_type, &group.spec.group_name)?;
        let connector = self
            .registry
            .connector(&backend.name, &backend.backend_type)
            .await?;

        let Some(raw) = self.cache.get(&team_name).await? else {
            return Ok(());
        };
        let mut mapping = parse_backend_mapping(&team_name, &raw)?;

        let instance_key = backend.instance_key();
        if let Some(team_id) = mapping.get(&instance_key).cloned() {
            connector.delete_team_by_id(&team_id).await?;
            info!(team_id = %team_id, backend = %instance_key, "deleted backing team");

            mapping.remove(&instance_key);
            if mapping.is_empty() {
                self.cache.delete(&team_name).await?;
            } else {
                self.cache
                    .set(&team_name, &render_backend_mapping(&mapping), None)
                    .await?;
            }
        }
        Ok(())
    }

    /// Desired Group-kind owner references are the namespace's parents that
    /// list this group; non-Group references are preserved verbatim.
    async fn reconcile_owner_references(&self, group: &mut Group) -> ReconcileResult<()> {
        let namespace = group.metadata.namespace.clone().unwrap_or_default();
        let name = group.metadata.name.clone().unwrap_or_default();

        let all = self.store.list(&namespace).await?;
        let mut desired: Vec<OwnerReference> = all
            .iter()
            .filter(|parent| parent.metadata.name.as_deref() != Some(name.as_str()))
            .filter(|parent| parent.spec.members.groups.iter().any(|child| *child == name))
            .filter_map(|parent| {
                let uid = parent.metadata.uid.clone()?;
                let parent_name = parent.metadata.name.clone()?;
                Some(OwnerReference {
                    api_version: GROUP_API_VERSION.to_string(),
                    kind: GROUP_KIND.to_string(),
                    name: parent_name,
                    uid,
                    block_owner_deletion: Some(true),
                    controller: None,
                })
            })
            .collect();
        desired.sort_by(|a, b| a.uid.cmp(&b.uid));

        let current = group.metadata.owner_references.clone().unwrap_or_default();
        let (mut current_group_refs, other_refs): (Vec<_>, Vec<_>) = current
            .into_iter()
            .partition(|r| r.kind == GROUP_KIND && r.api_version == GROUP_API_VERSION);
        current_group_refs.sort_by(|a, b| a.uid.cmp(&b.uid));

        if current_group_refs != desired {
            let mut combined = other_refs;
            combined.extend(desired);
            group.metadata.owner_references = if combined.is_empty() {
                None
            } else {
                Some(combined)
            };
            self.store.update_metadata(group).await?;
        }
        Ok(())
    }

    /// Look every expanded user up in the directory. Failures are logged and
    /// the user is skipped for onboarding on this pass.
    async fn enrich_users(&self, expanded: &[String]) -> HashMap<String, DirectoryUser> {
        let mut users = HashMap::with_capacity(expanded.len());
        for user_id in expanded {
            match self.directory.user_attributes(user_id).await {
                Ok(attributes) => match DirectoryUser::from_attributes(user_id, &attributes) {
                    Ok(user) => {
                        users.insert(user_id.clone(), user);
                    }
                    Err(e) => {
                        warn!(user = %user_id, error = %e, "directory entry did not decode, skipping user");
                    }
                },
                Err(e) => {
                    warn!(user = %user_id, error = %e, "directory lookup failed, skipping user");
                }
            }
        }
        users
    }

    async fn converge_backend(
        &self,
        backend: &BackendRef,
        group: &Group,
        expanded: &[String],
        directory_users: &HashMap<String, DirectoryUser>,
    ) -> ReconcileResult<()> {
        let connector = self
            .registry
            .connector(&backend.name, &backend.backend_type)
            .await?;
        let team_name = self
            .transformer
            .transform(&backend.backend_type, &group.spec.group_name)?;
        let instance_key = backend_instance_key(&backend.name, &backend.backend_type);

        let team_id = self
            .fetch_or_create_team(connector.as_ref(), &instance_key, &team_name, &group.spec.group_name)
            .await?;
        debug!(team_id = %team_id, backend = %instance_key, "resolved backing team");

        self.ensure_users_onboarded(connector.as_ref(), &instance_key, expanded, directory_users)
            .await?;

        let members = connector.fetch_team_members_by_team_id(&team_id).await?;

        let (to_add, to_remove) =
            self.compute_membership_diff(expanded, directory_users, &members, &instance_key)
                .await?;

        if !to_add.is_empty() {
            connector.add_user_to_team(&team_id, &to_add).await?;
            info!(team_id = %team_id, count = to_add.len(), "added users to team");
        }
        if !to_remove.is_empty() {
            connector.remove_user_from_team(&team_id, &to_remove).await?;
            info!(team_id = %team_id, count = to_remove.len(), "removed users from team");
        }
        Ok(())
    }

    /// Resolve the backing team id through the cache, creating the team on a
    /// miss. An "already exists" conflict converges to the requested name as
    /// the logical id.
    ///
    /// The shared write lock is held across the whole read-modify-write:
    /// other Groups converging to the same transformed name rewrite this key
    /// too, and an unguarded merge would lose their backend ids.
    async fn fetch_or_create_team(
        &self,
        connector: &dyn Connector,
        instance_key: &str,
        team_name: &str,
        group_name: &str,
    ) -> ReconcileResult<String> {
        let _guard = self.cache_lock.write().await;

        let mut mapping = match self.cache.get(team_name).await? {
            Some(raw) => parse_backend_mapping(team_name, &raw)?,
            None => BTreeMap::new(),
        };

        if let Some(team_id) = mapping.get(instance_key) {
            if !team_id.is_empty() {
                return Ok(team_id.clone());
            }
        }

        let team = Team {
            id: String::new(),
            name: team_name.to_string(),
            description: format!("team for {group_name}"),
            role: DEFAULT_ROLE.to_string(),
        };

        let team_id = match connector.create_team(&team).await {
            Ok(created) => created.id,
            Err(ConnectorError::AlreadyExists { .. }) => team_name.to_string(),
            Err(e) => return Err(e.into()),
        };

        mapping.insert(instance_key.to_string(), team_id.clone());
        self.cache
            .set(team_name, &render_backend_mapping(&mapping), None)
            .await?;

        Ok(team_id)
    }

    /// Create each enrichable user in the backend unless the cache already
    /// records an id for this instance, then record it in the cache and the
    /// offboarding candidate list.
    ///
    /// Each user's read-modify-write of their mapping runs under the shared
    /// write lock: reconciles of other Groups merge their own backend ids
    /// into the same email key. The lock is released before the `user_list`
    /// append, which acquires it itself.
    async fn ensure_users_onboarded(
        &self,
        connector: &dyn Connector,
        instance_key: &str,
        expanded: &[String],
        directory_users: &HashMap<String, DirectoryUser>,
    ) -> ReconcileResult<()> {
        for user_id in expanded {
            let Some(directory_user) = directory_users.get(user_id) else {
                warn!(user = %user_id, "user not enrichable, skipping onboarding");
                continue;
            };
            let email = directory_user.email();

            let onboarded = {
                let _guard = self.cache_lock.write().await;

                let mut mapping = match self.cache.get(&email).await? {
                    Some(raw) => parse_backend_mapping(&email, &raw)?,
                    None => BTreeMap::new(),
                };
                if mapping.get(instance_key).is_some_and(|id| !id.is_empty()) {
                    false
                } else {
                    let created = connector
                        .create_user(&User {
                            id: String::new(),
                            username: user_id.clone(),
                            email: email.clone(),
                            first_name: directory_user.display_name.clone(),
                            last_name: directory_user.sn.clone(),
                            display_name: directory_user.display_name.clone(),
                            role: DEFAULT_ROLE.to_string(),
                        })
                        .await?;

                    mapping.insert(instance_key.to_string(), created.id);
                    self.cache
                        .set(&email, &render_backend_mapping(&mapping), None)
                        .await?;
                    true
                }
            };

            if onboarded {
                info!(user = %user_id, backend = %instance_key, "created user in backend");
                self.record_offboarding_candidate(user_id).await?;
            }
        }
        Ok(())
    }

    /// Append a user to `user_list` under the shared write lock.
    async fn record_offboarding_candidate(&self, user_id: &str) -> ReconcileResult<()> {
        let _guard = self.cache_lock.write().await;

        let mut user_list = match self.cache.get(USER_LIST_KEY).await? {
            Some(raw) => parse_user_list(&raw)?,
            None => Vec::new(),
        };
        if !user_list.iter().any(|u| u == user_id) {
            user_list.push(user_id.to_string());
            self.cache
                .set(USER_LIST_KEY, &render_user_list(&user_list), None)
                .await?;
        }
        Ok(())
    }

    /// Translate the expanded member set through the cache and diff it
    /// against observed membership.
    async fn compute_membership_diff(
        &self,
        expanded: &[String],
        directory_users: &HashMap<String, DirectoryUser>,
        current_members: &HashMap<String, User>,
        instance_key: &str,
    ) -> ReconcileResult<(Vec<String>, Vec<String>)> {
        let mut to_sync: Vec<String> = Vec::new();
        let mut to_remove: Vec<String> = Vec::new();

        for user_id in expanded {
            let Some(directory_user) = directory_users.get(user_id) else {
                // The user existed once and vanished from the directory; if
                // they are still a member under their raw id, drop them.
                if current_members.contains_key(user_id) {
                    to_remove.push(user_id.clone());
                }
                continue;
            };

            let email = directory_user.email();
            let raw = self.cache.get(&email).await?.ok_or_else(|| {
                ReconcileError::UserIdMissing {
                    user: user_id.clone(),
                    instance_key: instance_key.to_string(),
                }
            })?;
            let mapping = parse_backend_mapping(&email, &raw)?;

            let backend_id = mapping
                .get(instance_key)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ReconcileError::UserIdMissing {
                    user: user_id.clone(),
                    instance_key: instance_key.to_string(),
                })?;
            to_sync.push(backend_id.clone());
        }

        for member_id in current_members.keys() {
            if !to_sync.iter().any(|id| id == member_id) {
                to_remove.push(member_id.clone());
            }
        }

        let mut to_add: Vec<String> = to_sync
            .into_iter()
            .filter(|id| !current_members.contains_key(id))
            .collect();

        to_add.sort();
        to_remove.sort();
        to_remove.dedup();
        Ok((to_add, to_remove))
    }

    /// Write per-backend substatus and the ready condition; a status write
    /// failure is logged without masking the reconcile outcome.
    async fn finalize_status(
        &self,
        group: &mut Group,
        expanded: Vec<String>,
        errors: &BTreeMap<String, String>,
    ) {
        let backends = group
            .spec
            .backends
            .iter()
            .map(|backend| match errors.get(&backend.backend_type) {
                None => BackendStatus {
                    name: backend.name.clone(),
                    backend_type: backend.backend_type.clone(),
                    ok: true,
                    message: "Successful".to_string(),
                },
                Some(message) => BackendStatus {
                    name: backend.name.clone(),
                    backend_type: backend.backend_type.clone(),
                    ok: false,
                    message: message.clone(),
                },
            })
            .collect();

        if errors.is_empty() {
            group.set_ready_condition("True", REASON_SUCCEEDED, "Successful");
        } else {
            let summary = errors
                .iter()
                .map(|(backend_type, message)| format!("{backend_type}: {message}"))
                .collect::<Vec<_>>()
                .join("; ");
            group.set_ready_condition("False", REASON_FAILED, &summary);
        }

        {
            let status = group.status.get_or_insert_with(Default::default);
            status.users = expanded;
            status.backends = backends;
            if errors.is_empty() {
                status.last_applied_generation = group.metadata.generation.unwrap_or_default();
            }
        }

        if let Err(e) = self.store.update_status(group).await {
            error!(error = %e, "failed to persist group status");
        }
    }
}
