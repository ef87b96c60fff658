//! # Connector Framework
//!
//! Core abstractions for converging declared group membership onto external
//! SaaS identity backends.
//!
//! The framework provides:
//!
//! - [`Connector`] - the uniform capability set every backend implements
//! - [`BackendRegistry`] - resolves `(name, type)` to a configured, enabled
//!   connector instance built from typed connection config
//! - [`NameTransformer`] - derives backend-side team names from logical group
//!   names via ordered regex/template rules
//! - [`HttpDoer`] - shared HTTP execution with pooling, mTLS and a
//!   circuit-breaker/retry guard used by the REST-backed connectors
//!
//! ## Example
//!
//! ```ignore
//! use usernaut_connector::prelude::*;
//!
//! let registry = BackendRegistry::new(backends, http_config);
//! registry.register_factory("fivetran", fivetran_factory);
//!
//! let connector = registry.connector("prod", "fivetran").await?;
//! let team = connector.create_team(&Team::named("data-platform")).await?;
//! connector.add_user_to_team(&team.id, &user_ids).await?;
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod registry;
pub mod resilience;
pub mod traits;
pub mod transform;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{BackendConfig, ConnectionPoolConfig, HttpClientConfig, ResiliencyConfig};
    pub use crate::error::{ConnectorError, ConnectorResult};
    pub use crate::http::HttpDoer;
    pub use crate::registry::{BackendRegistry, ConnectorFactory};
    pub use crate::resilience::CircuitBreaker;
    pub use crate::traits::Connector;
    pub use crate::transform::{NameTransformer, PatternRule, TransformError};
    pub use crate::types::{Team, User, DEFAULT_ROLE};
}

// Re-export async_trait for connector implementors.
pub use async_trait::async_trait;
