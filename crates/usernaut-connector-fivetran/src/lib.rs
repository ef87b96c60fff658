//! # Fivetran Connector
//!
//! Backend adapter for the Fivetran data-integration platform. Listings use
//! `next_cursor` pagination; team membership changes fan out per user with a
//! bounded number of in-flight requests, collecting per-user failures into
//! one aggregated error.

pub mod config;
pub mod connector;
mod types;

pub use config::FivetranConfig;
pub use connector::FivetranConnector;

use std::sync::Arc;

use usernaut_connector::config::{BackendConfig, HttpClientConfig};
use usernaut_connector::registry::ConnectorFactory;
use usernaut_connector::traits::Connector;

/// Backend type string this crate serves.
pub const BACKEND_TYPE: &str = "fivetran";

/// Role granted to members added to a team.
pub const TEAM_MEMBER_ROLE: &str = "Team Member";

/// Registry factory for fivetran backends.
#[must_use]
pub fn factory() -> ConnectorFactory {
    Box::new(|config: &BackendConfig, http: &HttpClientConfig| {
        let connector = FivetranConnector::new(config, http)?;
        Ok(Arc::new(connector) as Arc<dyn Connector>)
    })
}
