//! Rover connection configuration.

use serde::{Deserialize, Serialize};

use usernaut_connector::error::{ConnectorError, ConnectorResult};

/// Typed view of the rover `connection` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoverConfig {
    /// API base URL, e.g. `https://rover.corp.example.com/api`.
    pub url: String,

    /// Service account that owns every group usernaut creates.
    #[serde(rename = "serviceAccountName")]
    pub service_account_name: String,

    /// Token presented on every request.
    #[serde(default)]
    pub token: String,

    /// Contact email recorded on created groups.
    #[serde(default = "default_contact_email", rename = "contactEmail")]
    pub contact_email: String,
}

fn default_contact_email() -> String {
    "usernaut@example.com".to_string()
}

impl RoverConfig {
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.url.is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "missing required connection parameter 'url' for rover backend",
            ));
        }
        if self.service_account_name.is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "missing required connection parameter 'serviceAccountName' for rover backend",
            ));
        }
        Ok(())
    }
}
