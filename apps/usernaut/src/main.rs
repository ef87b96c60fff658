//! Usernaut operator entrypoint.
//!
//! Wires configuration, the identity cache, the directory reader, the
//! backend registry and the name transformer into the group controller, the
//! periodic task manager and the admin API.

mod config;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;
use kube::ResourceExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use usernaut_api::ApiState;
use usernaut_cache::{new_cache, SharedCacheLock};
use usernaut_connector::registry::BackendRegistry;
use usernaut_connector::transform::NameTransformer;
use usernaut_controller::offboarding::OffboardingJob;
use usernaut_controller::periodic::PeriodicTaskManager;
use usernaut_controller::reconciler::GroupReconciler;
use usernaut_controller::store::KubeGroupStore;
use usernaut_controller::{Group, GroupStore, ReconcileError};
use usernaut_directory::{Directory, LdapDirectory};

use crate::config::AppConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

struct Context {
    reconciler: GroupReconciler,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    info!("starting usernaut v{}", VERSION);

    let app_config = AppConfig::load()?;
    info!(environment = %app_config.app.environment, "configuration loaded");

    // Shared dependencies.
    let cache = new_cache(&app_config.cache).await?;
    let cache_lock = SharedCacheLock::new();
    let directory: Arc<dyn Directory> = Arc::new(LdapDirectory::new(app_config.ldap.clone())?);
    let transformer = Arc::new(NameTransformer::new(&app_config.pattern)?);

    let registry = Arc::new(BackendRegistry::new(
        app_config.backends.clone(),
        app_config.http_client.clone(),
    ));
    registry
        .register_factory(
            usernaut_connector_rover::BACKEND_TYPE,
            usernaut_connector_rover::factory(),
        )
        .await;
    registry
        .register_factory(
            usernaut_connector_fivetran::BACKEND_TYPE,
            usernaut_connector_fivetran::factory(),
        )
        .await;
    registry
        .register_factory(
            usernaut_connector_snowflake::BACKEND_TYPE,
            usernaut_connector_snowflake::factory(),
        )
        .await;

    let shutdown = CancellationToken::new();

    // Admin API.
    let api_state = Arc::new(ApiState {
        registry: Arc::clone(&registry),
        cache: Arc::clone(&cache),
    });
    let bind_addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(address = %bind_addr, "admin api listening");
    let api_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let router = usernaut_api::router(api_state);
        let serve = axum::serve(listener, router)
            .with_graceful_shutdown(async move { api_shutdown.cancelled().await });
        if let Err(e) = serve.await {
            error!(error = %e, "admin api server exited");
        }
    });

    // Periodic tasks, gated on cache health.
    let offboarding = OffboardingJob::new(
        Arc::clone(&cache),
        cache_lock.clone(),
        Arc::clone(&directory),
        registry.enabled_connectors().await,
        &app_config.offboarding.preserved_types,
    );
    let mut task_manager = PeriodicTaskManager::new(Arc::clone(&cache));
    task_manager.add_task(Arc::new(offboarding));
    let task_handles = task_manager.start(shutdown.clone()).await.map_err(|e| {
        anyhow::anyhow!("failed to start periodic tasks: {e}")
    })?;

    // Group controller.
    let client = kube::Client::try_default().await?;
    let store: Arc<dyn GroupStore> = Arc::new(KubeGroupStore::new(client.clone()));
    let reconciler = GroupReconciler::new(
        store,
        Arc::clone(&cache),
        cache_lock,
        directory,
        registry,
        transformer,
    );
    let context = Arc::new(Context { reconciler });

    tokio::spawn(handle_signals(shutdown.clone()));

    run_controller(client, context).await;
    shutdown.cancel();

    for handle in task_handles {
        let _ = handle.await;
    }
    info!("usernaut stopped");
    Ok(())
}

fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

async fn handle_signals(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
        shutdown.cancel();
    }
}

/// Watch Groups across namespaces; a child modification enqueues every group
/// in its namespace that references it.
async fn run_controller(client: kube::Client, context: Arc<Context>) {
    let groups: Api<Group> = Api::all(client);

    let controller = Controller::new(groups.clone(), watcher::Config::default());
    let reader = controller.store();

    controller
        .watches(groups, watcher::Config::default(), move |child: Group| {
            let child_name = child.name_any();
            let child_namespace = child.namespace().unwrap_or_default();
            reader
                .state()
                .iter()
                .filter(|parent| {
                    parent.namespace().as_deref() == Some(child_namespace.as_str())
                        && parent
                            .spec
                            .members
                            .groups
                            .iter()
                            .any(|referenced| *referenced == child_name)
                })
                .map(|parent| {
                    ObjectRef::new(&parent.name_any()).within(&child_namespace)
                })
                .collect::<Vec<_>>()
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!(object = %object, "reconciled"),
                Err(e) => warn!(error = %e, "reconcile stream error"),
            }
        })
        .await;
}

async fn reconcile(
    group: Arc<Group>,
    context: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let namespace = group.namespace().unwrap_or_default();
    let name = group.name_any();
    context.reconciler.reconcile(&namespace, &name).await?;
    Ok(Action::await_change())
}

fn error_policy(_group: Arc<Group>, error: &ReconcileError, _context: Arc<Context>) -> Action {
    warn!(error = %error, "reconcile failed, requeueing");
    Action::requeue(Duration::from_secs(30))
}
