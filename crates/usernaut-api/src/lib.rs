//! # Admin API
//!
//! Read-only HTTP surface exposing the configured backends and a liveness
//! probe that depends on the identity cache being reachable.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;

use usernaut_cache::Cache;
use usernaut_connector::registry::BackendRegistry;

/// Shared state behind the admin routes.
pub struct ApiState {
    pub registry: Arc<BackendRegistry>,
    pub cache: Arc<dyn Cache>,
}

/// One enabled backend, as listed by the API.
#[derive(Debug, Serialize)]
pub struct BackendEntry {
    pub name: String,

    #[serde(rename = "type")]
    pub backend_type: String,
}

/// Build the admin router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/v1/backends", get(list_backends))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn list_backends(State(state): State<Arc<ApiState>>) -> Json<Vec<BackendEntry>> {
    let backends = state
        .registry
        .enabled_backends()
        .into_iter()
        .map(|(name, backend_type)| BackendEntry { name, backend_type })
        .collect();
    Json(backends)
}

/// Liveness: a set/get/delete round trip against the cache.
async fn healthz(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let probe_key = "healthz_probe";
    let probe = async {
        state
            .cache
            .set(probe_key, "ok", Some(Duration::from_secs(30)))
            .await?;
        state.cache.get(probe_key).await?;
        state.cache.delete(probe_key).await?;
        Ok::<(), usernaut_cache::CacheError>(())
    }
    .await;

    match probe {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            warn!(error = %e, "cache liveness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, "cache unreachable")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use usernaut_cache::memory::{MemoryCache, MemoryConfig};
    use usernaut_connector::config::{BackendConfig, HttpClientConfig};

    async fn serve(state: Arc<ApiState>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn state() -> Arc<ApiState> {
        let registry = BackendRegistry::new(
            vec![
                BackendConfig {
                    name: "prod".to_string(),
                    backend_type: "fivetran".to_string(),
                    enabled: true,
                    connection: serde_json::Map::new(),
                },
                BackendConfig {
                    name: "old".to_string(),
                    backend_type: "snowflake".to_string(),
                    enabled: false,
                    connection: serde_json::Map::new(),
                },
            ],
            HttpClientConfig::default(),
        );
        Arc::new(ApiState {
            registry: Arc::new(registry),
            cache: Arc::new(MemoryCache::new(&MemoryConfig::default())),
        })
    }

    #[tokio::test]
    async fn test_backends_lists_enabled_only() {
        let base = serve(state()).await;

        let body: serde_json::Value = reqwest::get(format!("{base}/api/v1/backends"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(
            body,
            serde_json::json!([{"name": "prod", "type": "fivetran"}])
        );
    }

    #[tokio::test]
    async fn test_healthz_ok_with_reachable_cache() {
        let base = serve(state()).await;

        let response = reqwest::get(format!("{base}/healthz")).await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }
}
