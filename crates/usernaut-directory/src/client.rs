//! LDAP implementation of the directory reader.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, DirectoryResult};
use crate::Directory;

/// Directory reader over a lazily-dialed, cached LDAP connection.
///
/// The underlying handle multiplexes requests, so one connection serves all
/// reconciles. When a call fails at the transport level the cached handle is
/// dropped and the call redials once; a redial failure is reported instead of
/// silently operating on a dead connection.
pub struct LdapDirectory {
    config: DirectoryConfig,
    connection: Arc<RwLock<Option<Ldap>>>,
}

impl LdapDirectory {
    pub fn new(config: DirectoryConfig) -> DirectoryResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connection: Arc::new(RwLock::new(None)),
        })
    }

    async fn connection(&self) -> DirectoryResult<Ldap> {
        {
            let guard = self.connection.read().await;
            if let Some(ldap) = guard.as_ref() {
                return Ok(ldap.clone());
            }
        }

        let ldap = self.dial().await?;

        let mut guard = self.connection.write().await;
        if let Some(existing) = guard.as_ref() {
            return Ok(existing.clone());
        }
        *guard = Some(ldap.clone());
        Ok(ldap)
    }

    async fn dial(&self) -> DirectoryResult<Ldap> {
        debug!(server = %self.config.server, "dialing directory");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(self.config.connect_timeout_secs));

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.server)
            .await
            .map_err(|e| {
                DirectoryError::connection_with_source(
                    format!("failed to connect to {}", self.config.server),
                    e,
                )
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "directory connection driver exited");
            }
        });

        if let Some(bind_dn) = &self.config.bind_dn {
            let password = self.config.bind_password.as_deref().unwrap_or("");
            ldap.simple_bind(bind_dn, password)
                .await
                .map_err(|e| {
                    DirectoryError::connection_with_source(format!("bind failed for {bind_dn}"), e)
                })?
                .success()
                .map_err(|e| {
                    DirectoryError::connection_with_source(format!("bind rejected for {bind_dn}"), e)
                })?;
        }

        info!(server = %self.config.server, "directory connection established");
        Ok(ldap)
    }

    async fn drop_connection(&self) {
        let mut guard = self.connection.write().await;
        *guard = None;
    }

    async fn search_user(
        &self,
        ldap: &mut Ldap,
        user_id: &str,
    ) -> Result<Vec<SearchEntry>, LdapError> {
        let base = self.config.user_dn.replace("%s", &ldap_escape(user_id));
        let attrs: Vec<&str> = self.config.attributes.iter().map(String::as_str).collect();

        let (entries, _) = ldap
            .search(&base, Scope::Base, &self.config.user_search_filter, attrs)
            .await?
            .success()?;

        Ok(entries.into_iter().map(SearchEntry::construct).collect())
    }

    fn entry_to_attributes(&self, entry: &SearchEntry) -> HashMap<String, String> {
        let mut attributes = HashMap::with_capacity(self.config.attributes.len());
        for attr in &self.config.attributes {
            let value = entry
                .attrs
                .get(attr)
                .and_then(|values| values.first())
                .cloned()
                .unwrap_or_default();
            attributes.insert(attr.clone(), value);
        }
        attributes
    }
}

/// True for failures of the connection itself, where a redial can help.
fn is_connection_error(err: &LdapError) -> bool {
    !matches!(err, LdapError::LdapResult { .. })
}

/// Map an LDAP failure onto the directory error taxonomy. `noSuchObject`
/// is absence, every other protocol code is a search failure.
fn map_search_error(user_id: &str, err: LdapError) -> DirectoryError {
    match err {
        LdapError::LdapResult { result } if result.rc == crate::error::RC_NO_SUCH_OBJECT => {
            DirectoryError::UserNotFound {
                user_id: user_id.to_string(),
            }
        }
        LdapError::LdapResult { result } => DirectoryError::Search {
            code: result.rc,
            message: result.text,
        },
        other => DirectoryError::connection_with_source("directory search failed", other),
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn user_attributes(&self, user_id: &str) -> DirectoryResult<HashMap<String, String>> {
        let mut ldap = self.connection().await?;

        let entries = match self.search_user(&mut ldap, user_id).await {
            Ok(entries) => entries,
            Err(e) if is_connection_error(&e) => {
                warn!(user_id, error = %e, "directory search failed, redialing");
                self.drop_connection().await;
                let mut ldap = self.connection().await?;
                self.search_user(&mut ldap, user_id)
                    .await
                    .map_err(|e| map_search_error(user_id, e))?
            }
            Err(e) => return Err(map_search_error(user_id, e)),
        };

        let Some(entry) = entries.first() else {
            return Err(DirectoryError::UserNotFound {
                user_id: user_id.to_string(),
            });
        };

        Ok(self.entry_to_attributes(entry))
    }
}
