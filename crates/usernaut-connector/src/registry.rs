//! Backend registry.
//!
//! Two-level lookup `type -> name -> BackendConfig` with factory-based
//! construction and instance caching. A construction failure is terminal for
//! that backend on the current reconcile pass and never affects others.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::{BackendConfig, HttpClientConfig};
use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::Connector;

/// Factory building a connector from its backend config and the shared HTTP
/// client settings.
pub type ConnectorFactory =
    Box<dyn Fn(&BackendConfig, &HttpClientConfig) -> ConnectorResult<Arc<dyn Connector>> + Send + Sync>;

/// Registry of configured backends and the factories that build connectors
/// for them.
pub struct BackendRegistry {
    /// `type -> name -> config`.
    backends: HashMap<String, HashMap<String, BackendConfig>>,
    http: HttpClientConfig,
    factories: RwLock<HashMap<String, ConnectorFactory>>,
    instances: RwLock<HashMap<String, Arc<dyn Connector>>>,
}

impl BackendRegistry {
    #[must_use]
    pub fn new(backends: Vec<BackendConfig>, http: HttpClientConfig) -> Self {
        let mut by_type: HashMap<String, HashMap<String, BackendConfig>> = HashMap::new();
        for backend in backends {
            by_type
                .entry(backend.backend_type.to_lowercase())
                .or_default()
                .insert(backend.name.clone(), backend);
        }
        Self {
            backends: by_type,
            http,
            factories: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Register the factory for a backend type.
    pub async fn register_factory(&self, backend_type: &str, factory: ConnectorFactory) {
        let mut factories = self.factories.write().await;
        factories.insert(backend_type.to_lowercase(), factory);
    }

    /// Resolve the connector for `(name, backend_type)`, constructing and
    /// caching it on first use.
    pub async fn connector(
        &self,
        name: &str,
        backend_type: &str,
    ) -> ConnectorResult<Arc<dyn Connector>> {
        let config = self
            .backends
            .get(&backend_type.to_lowercase())
            .and_then(|by_name| by_name.get(name))
            .ok_or_else(|| ConnectorError::UnknownBackend {
                name: name.to_string(),
                backend_type: backend_type.to_string(),
            })?;

        if !config.enabled {
            return Err(ConnectorError::BackendDisabled {
                name: name.to_string(),
                backend_type: backend_type.to_string(),
            });
        }

        let instance_key = config.instance_key();
        {
            let instances = self.instances.read().await;
            if let Some(connector) = instances.get(&instance_key) {
                return Ok(Arc::clone(connector));
            }
        }

        let connector = {
            let factories = self.factories.read().await;
            let factory = factories.get(&backend_type.to_lowercase()).ok_or_else(|| {
                ConnectorError::UnknownBackend {
                    name: name.to_string(),
                    backend_type: backend_type.to_string(),
                }
            })?;
            factory(config, &self.http)?
        };

        let mut instances = self.instances.write().await;
        // Another reconcile may have built it in the meantime.
        if let Some(existing) = instances.get(&instance_key) {
            return Ok(Arc::clone(existing));
        }
        instances.insert(instance_key, Arc::clone(&connector));
        Ok(connector)
    }

    /// Every enabled backend as `(name, type)`, sorted for stable output.
    #[must_use]
    pub fn enabled_backends(&self) -> Vec<(String, String)> {
        let mut enabled: Vec<(String, String)> = self
            .backends
            .values()
            .flat_map(|by_name| by_name.values())
            .filter(|b| b.enabled)
            .map(|b| (b.name.clone(), b.backend_type.clone()))
            .collect();
        enabled.sort();
        enabled
    }

    /// Connectors for every enabled backend with a registered factory, keyed
    /// by instance key. Backends that fail construction are skipped.
    pub async fn enabled_connectors(&self) -> HashMap<String, Arc<dyn Connector>> {
        let mut connectors = HashMap::new();
        for (name, backend_type) in self.enabled_backends() {
            if let Ok(connector) = self.connector(&name, &backend_type).await {
                connectors.insert(format!("{name}_{backend_type}"), connector);
            }
        }
        connectors
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.backends.keys())
            .finish()
    }
}
