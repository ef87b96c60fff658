//! # Snowflake Connector
//!
//! Backend adapter for the Snowflake data warehouse. Teams are roles; team
//! membership is a role grant. Listings paginate through the HTTP `Link`
//! header (`rel="next"`), and every user and role name is canonicalized to
//! lowercase at the boundary because Snowflake upper-cases unquoted
//! identifiers.

pub mod config;
pub mod connector;
mod pagination;
mod types;

pub use config::SnowflakeConfig;
pub use connector::SnowflakeConnector;

use std::sync::Arc;

use usernaut_connector::config::{BackendConfig, HttpClientConfig};
use usernaut_connector::registry::ConnectorFactory;
use usernaut_connector::traits::Connector;

/// Backend type string this crate serves.
pub const BACKEND_TYPE: &str = "snowflake";

/// Registry factory for snowflake backends.
#[must_use]
pub fn factory() -> ConnectorFactory {
    Box::new(|config: &BackendConfig, http: &HttpClientConfig| {
        let connector = SnowflakeConnector::new(config, http)?;
        Ok(Arc::new(connector) as Arc<dyn Connector>)
    })
}
