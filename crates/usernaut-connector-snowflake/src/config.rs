//! Snowflake connection configuration.

use serde::{Deserialize, Serialize};

use usernaut_connector::error::{ConnectorError, ConnectorResult};

/// Typed view of the snowflake `connection` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnowflakeConfig {
    /// Programmatic access token presented as a bearer token.
    pub pat: String,

    /// Account API base URL, e.g. `https://acme-dw.snowflakecomputing.com`.
    #[serde(rename = "base_url")]
    pub base_url: String,
}

impl SnowflakeConfig {
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.pat.is_empty() || self.base_url.is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "missing required connection parameters for snowflake backend: pat and base_url",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connection_keys() {
        let raw = serde_json::json!({
            "pat": "token",
            "base_url": "https://acme.snowflakecomputing.com"
        });
        let config: SnowflakeConfig = serde_json::from_value(raw).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_pat_rejected() {
        let config = SnowflakeConfig {
            pat: String::new(),
            base_url: "https://acme.snowflakecomputing.com".to_string(),
        };
        assert!(config.validate().is_err());
    }
}
