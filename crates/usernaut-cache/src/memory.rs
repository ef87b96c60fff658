//! In-process cache driver.
//!
//! Backed by a moka future cache with a per-entry expiration policy so a
//! `set` with no TTL lives until deleted while TTL'd entries expire on their
//! own. Pattern scans glob over the live key set.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};
use crate::Cache;

/// Driver name accepted by the factory.
pub const DRIVER: &str = "memory";

/// Tuning for the in-process driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Upper bound on cached entries before eviction kicks in.
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,

    /// Default TTL in seconds applied when a `set` carries no TTL.
    /// Absent means entries never expire.
    #[serde(default)]
    pub default_ttl_secs: Option<u64>,
}

fn default_max_entries() -> u64 {
    100_000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            default_ttl_secs: None,
        }
    }
}

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Option<Duration>,
}

struct PerEntryExpiry;

impl Expiry<String, Entry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// In-process expiring map.
pub struct MemoryCache {
    inner: MokaCache<String, Entry>,
    default_ttl: Option<Duration>,
}

impl MemoryCache {
    #[must_use]
    pub fn new(config: &MemoryConfig) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(config.max_entries)
            .expire_after(PerEntryExpiry)
            .build();

        Self {
            inner,
            default_ttl: config.default_ttl_secs.map(Duration::from_secs),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.inner.get(key).await.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let entry = Entry {
            value: value.to_string(),
            ttl: ttl.or(self.default_ttl),
        };
        self.inner.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.inner.invalidate(key).await;
        Ok(())
    }

    async fn get_by_pattern(&self, pattern: &str) -> CacheResult<BTreeMap<String, String>> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        // Flush pending expirations so the scan only sees live keys.
        self.inner.run_pending_tasks().await;

        let mut matches = BTreeMap::new();
        for (key, entry) in self.inner.iter() {
            if matcher.matches(key.as_str()) {
                matches.insert(key.as_ref().clone(), entry.value);
            }
        }
        Ok(matches)
    }
}
