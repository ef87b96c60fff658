//! Redis cache driver.
//!
//! Shares the in-process driver's semantics; pattern scans run `SCAN MATCH`
//! over the keyspace and fetch the surviving keys with one `MGET`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};
use crate::Cache;

/// Driver name accepted by the factory.
pub const DRIVER: &str = "redis";

/// Connection settings for the Redis driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub database: i64,

    #[serde(default)]
    pub password: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6379
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: 0,
            password: String::new(),
        }
    }
}

impl RedisConfig {
    fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.database)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.database
            )
        }
    }
}

/// Redis-backed cache.
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Open a managed connection and verify it with a `PING`.
    pub async fn connect(config: &RedisConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.url())
            .map_err(|e| CacheError::backend_with_source("invalid redis url", e))?;

        let mut manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::backend_with_source("redis connection failed", e))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut manager)
            .await
            .map_err(|e| CacheError::backend_with_source("redis ping failed", e))?;
        if pong != "PONG" {
            return Err(CacheError::backend(format!("unexpected ping reply: {pong}")));
        }

        Ok(Self { manager })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend_with_source("redis GET failed", e))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis() as u64);
        }
        let _: () = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend_with_source("redis SET failed", e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend_with_source("redis DEL failed", e))?;
        Ok(())
    }

    async fn get_by_pattern(&self, pattern: &str) -> CacheResult<BTreeMap<String, String>> {
        let mut conn = self.manager.clone();

        let mut keys: Vec<String> = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::backend_with_source("redis SCAN failed", e))?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        if keys.is_empty() {
            return Ok(BTreeMap::new());
        }

        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend_with_source("redis MGET failed", e))?;

        let mut matches = BTreeMap::new();
        for (key, value) in keys.into_iter().zip(values) {
            // A key can expire between SCAN and MGET; skip the hole.
            if let Some(value) = value {
                matches.insert(key, value);
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_without_password() {
        let config = RedisConfig::default();
        assert_eq!(config.url(), "redis://localhost:6379/0");
    }

    #[test]
    fn test_url_with_password_and_db() {
        let config = RedisConfig {
            password: "hunter2".to_string(),
            database: 3,
            ..Default::default()
        };
        assert_eq!(config.url(), "redis://:hunter2@localhost:6379/3");
    }

    #[test]
    fn test_config_defaults_from_yaml() {
        let config: RedisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 6379);
        assert_eq!(config.database, 0);
    }
}
