//! Fivetran connection configuration.

use serde::{Deserialize, Serialize};

use usernaut_connector::error::{ConnectorError, ConnectorResult};

/// Typed view of the fivetran `connection` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FivetranConfig {
    /// API key, paired with the secret for basic auth.
    #[serde(rename = "apikey")]
    pub api_key: String,

    #[serde(rename = "apisecret")]
    pub api_secret: String,

    /// API base URL; overridable for testing.
    #[serde(default = "default_base_url", rename = "baseUrl")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "https://api.fivetran.com".to_string()
}

impl FivetranConfig {
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "missing required connection parameters for fivetran backend: apikey and apisecret",
            ));
        }
        Ok(())
    }
}
