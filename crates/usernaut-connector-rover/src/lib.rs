//! # Rover Connector
//!
//! Backend adapter for the corporate directory group service. Rover *is* the
//! directory, so identity lifecycle operations are inert: users are never
//! created or deleted here, and a user's backend-native id is their username.
//! Team and membership operations are real: groups are created with a full
//! group spec owned by a service account, and membership changes go through a
//! single `membersMod` POST carrying additions or deletions.

pub mod config;
pub mod connector;
mod types;

pub use config::RoverConfig;
pub use connector::RoverConnector;

use std::sync::Arc;

use usernaut_connector::config::{BackendConfig, HttpClientConfig};
use usernaut_connector::registry::ConnectorFactory;
use usernaut_connector::traits::Connector;

/// Backend type string this crate serves.
pub const BACKEND_TYPE: &str = "rover";

/// Registry factory for rover backends.
#[must_use]
pub fn factory() -> ConnectorFactory {
    Box::new(|config: &BackendConfig, http: &HttpClientConfig| {
        let connector = RoverConnector::new(config, http)?;
        Ok(Arc::new(connector) as Arc<dyn Connector>)
    })
}
