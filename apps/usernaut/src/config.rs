//! Application configuration loading.
//!
//! Configuration lives in `$WORKDIR/appconfig`: `default.yaml` is always
//! loaded, then the `$APP_ENV` overlay is deep-merged on top. After the
//! merge, every string of the form `env|NAME` or `file|/path` anywhere in
//! the tree is substituted (file contents trimmed).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use usernaut_cache::CacheConfig;
use usernaut_connector::config::{BackendConfig, HttpClientConfig};
use usernaut_connector::transform::PatternRule;
use usernaut_directory::DirectoryConfig;

const CONFIG_DIR: &str = "appconfig";
const DEFAULT_ENV: &str = "default";
const WORKDIR_ENV: &str = "WORKDIR";
const APP_ENV: &str = "APP_ENV";
const ENV_PREFIX: &str = "env|";
const FILE_PREFIX: &str = "file|";

/// Configuration loading error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: App,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    /// Per-backend-type name transformation rules.
    #[serde(default)]
    pub pattern: HashMap<String, Vec<PatternRule>>,

    pub ldap: DirectoryConfig,

    #[serde(default, rename = "httpClient")]
    pub http_client: HttpClientConfig,

    #[serde(default)]
    pub offboarding: OffboardingConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct App {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub environment: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OffboardingConfig {
    /// Backend types whose access offboarding preserves.
    #[serde(default, rename = "preservedTypes")]
    pub preserved_types: Vec<String>,
}

/// Admin HTTP server binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration for the environment named by `APP_ENV`.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var(APP_ENV).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        Self::load_env(&config_dir(), &env)
    }

    /// Load `default.yaml` plus the named overlay from `dir`.
    pub fn load_env(dir: &Path, env: &str) -> Result<Self, ConfigError> {
        let mut merged = read_yaml(&dir.join(format!("{DEFAULT_ENV}.yaml")))?;

        if env != DEFAULT_ENV {
            let overlay = read_yaml(&dir.join(format!("{env}.yaml")))?;
            merge(&mut merged, overlay);
        }

        substitute(&mut merged)?;

        serde_yaml::from_value(merged).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })
    }
}

fn config_dir() -> PathBuf {
    match std::env::var(WORKDIR_ENV) {
        Ok(workdir) if !workdir.is_empty() => Path::new(&workdir).join(CONFIG_DIR),
        _ => PathBuf::from(format!("./{CONFIG_DIR}")),
    }
}

fn read_yaml(path: &Path) -> Result<serde_yaml::Value, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Deep merge: overlay mappings merge key-wise, everything else replaces.
fn merge(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base_map), serde_yaml::Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.entry(key) {
                    serde_yaml::mapping::Entry::Occupied(mut slot) => merge(slot.get_mut(), value),
                    serde_yaml::mapping::Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        (slot, overlay) => *slot = overlay,
    }
}

/// Walk the tree substituting `env|NAME` and `file|/path` strings.
fn substitute(value: &mut serde_yaml::Value) -> Result<(), ConfigError> {
    match value {
        serde_yaml::Value::String(s) => {
            if let Some(name) = s.strip_prefix(ENV_PREFIX) {
                *s = std::env::var(name).unwrap_or_default();
            } else if let Some(path) = s.strip_prefix(FILE_PREFIX) {
                let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
                *s = contents.trim().to_string();
            }
        }
        serde_yaml::Value::Mapping(mapping) => {
            for (_, nested) in mapping.iter_mut() {
                substitute(nested)?;
            }
        }
        serde_yaml::Value::Sequence(sequence) => {
            for nested in sequence.iter_mut() {
                substitute(nested)?;
            }
        }
        _ => {}
    }
    Ok(())
}
