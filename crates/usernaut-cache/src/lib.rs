//! # Identity Cache
//!
//! Persistent mapping from canonical user emails and backend-side team names
//! to backend-native identifiers.
//!
//! Two logical namespaces share one key-value surface:
//!
//! - user entries: lowercased email -> JSON `{ "<name>_<type>" -> user id }`
//! - team entries: transformed team name -> JSON `{ "<name>_<type>" -> team id }`
//!
//! The auxiliary `user_list` key holds a JSON array of directory usernames the
//! offboarding sweep considers.
//!
//! Two drivers share identical semantics: an in-process expiring map backed by
//! moka and a Redis-backed store. `get` of a missing key is a cache miss
//! (`Ok(None)`), never an error.

pub mod codec;
pub mod error;
pub mod lock;
pub mod memory;
pub mod redis;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::codec::{parse_backend_mapping, parse_user_list, render_backend_mapping, render_user_list};
pub use crate::error::{CacheError, CacheResult};
pub use crate::lock::SharedCacheLock;

/// Key under which the offboarding candidate list is stored.
pub const USER_LIST_KEY: &str = "user_list";

/// Cache key-value contract shared by every driver.
///
/// Values are opaque UTF-8 strings; callers layer JSON on top via [`codec`].
/// Pattern scans return a `BTreeMap` so matches come back in a canonical
/// lexicographic key order and first-match semantics are deterministic.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a value. A missing key is `Ok(None)`, not an error.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store a value. `ttl = None` means the entry never expires.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    /// Remove a key. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Return every live `key -> value` whose key matches the shell-style
    /// glob `pattern`, in lexicographic key order.
    async fn get_by_pattern(&self, pattern: &str) -> CacheResult<BTreeMap<String, String>>;
}

/// Selects and configures the backing driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// `memory` or `redis`.
    #[serde(default = "default_driver")]
    pub driver: String,

    #[serde(default)]
    pub memory: Option<memory::MemoryConfig>,

    #[serde(default)]
    pub redis: Option<redis::RedisConfig>,
}

fn default_driver() -> String {
    memory::DRIVER.to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            memory: None,
            redis: None,
        }
    }
}

/// Construct the cache driver named by `config.driver`.
pub async fn new_cache(config: &CacheConfig) -> CacheResult<Arc<dyn Cache>> {
    match config.driver.to_lowercase().as_str() {
        memory::DRIVER => {
            let cfg = config.memory.clone().unwrap_or_default();
            Ok(Arc::new(memory::MemoryCache::new(&cfg)))
        }
        redis::DRIVER => {
            let cfg = config.redis.clone().unwrap_or_default();
            Ok(Arc::new(redis::RedisCache::connect(&cfg).await?))
        }
        other => Err(CacheError::InvalidDriver {
            driver: other.to_string(),
        }),
    }
}

/// The inner key of a cache mapping for one configured backend instance.
#[must_use]
pub fn backend_instance_key(name: &str, backend_type: &str) -> String {
    format!("{name}_{backend_type}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_factory_memory_driver() {
        let cache = new_cache(&CacheConfig::default()).await.unwrap();
        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_factory_unknown_driver() {
        let config = CacheConfig {
            driver: "etcd".to_string(),
            ..Default::default()
        };
        let err = new_cache(&config).await.err().unwrap();
        assert!(matches!(err, CacheError::InvalidDriver { .. }));
    }

    #[test]
    fn test_backend_instance_key() {
        assert_eq!(backend_instance_key("prod", "fivetran"), "prod_fivetran");
    }
}
