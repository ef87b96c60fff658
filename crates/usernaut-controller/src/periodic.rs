//! Interval-driven background tasks.
//!
//! A task declares a name and an interval; the manager runs each in its own
//! tokio task. A zero interval means run once at startup. Before any task
//! starts, the manager gates on the cache answering a set/get/delete probe.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use usernaut_cache::Cache;

/// Error type background tasks report.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// A named task executed on a fixed interval.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    fn name(&self) -> &str;

    /// Zero means run once at startup.
    fn interval(&self) -> Duration;

    async fn run(&self, token: &CancellationToken) -> Result<(), TaskError>;
}

/// Probe attempts before giving up on the cache at startup.
const CACHE_PROBE_ATTEMPTS: u32 = 5;

/// Spacing between probe attempts.
const CACHE_PROBE_DELAY: Duration = Duration::from_secs(2);

/// Owns the fixed list of periodic tasks.
pub struct PeriodicTaskManager {
    cache: Arc<dyn Cache>,
    tasks: Vec<Arc<dyn PeriodicTask>>,
}

impl PeriodicTaskManager {
    #[must_use]
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            tasks: Vec::new(),
        }
    }

    pub fn add_task(&mut self, task: Arc<dyn PeriodicTask>) {
        self.tasks.push(task);
    }

    /// Wait for the cache, then launch every task. Handles are returned so
    /// the caller can await shutdown.
    pub async fn start(&self, token: CancellationToken) -> Result<Vec<JoinHandle<()>>, TaskError> {
        self.wait_for_cache(&token).await?;

        info!(tasks = self.tasks.len(), "starting periodic tasks");
        let handles = self
            .tasks
            .iter()
            .map(|task| {
                let task = Arc::clone(task);
                let token = token.clone();
                tokio::spawn(async move {
                    run_task(task, token).await;
                })
            })
            .collect();
        Ok(handles)
    }

    /// Bounded-retry set/get/delete probe against the cache.
    async fn wait_for_cache(&self, token: &CancellationToken) -> Result<(), TaskError> {
        let mut last_error = String::new();

        for attempt in 1..=CACHE_PROBE_ATTEMPTS {
            if token.is_cancelled() {
                return Err("cancelled while waiting for cache".into());
            }

            let probe_key = format!("health_check_{}", Utc::now().timestamp());
            let outcome = async {
                self.cache
                    .set(&probe_key, "healthy", Some(Duration::from_secs(30)))
                    .await?;
                self.cache.get(&probe_key).await?;
                self.cache.delete(&probe_key).await?;
                Ok::<(), usernaut_cache::CacheError>(())
            }
            .await;

            match outcome {
                Ok(()) => {
                    info!(attempt, "cache health check passed");
                    return Ok(());
                }
                Err(e) => {
                    last_error = e.to_string();
                    info!(attempt, error = %last_error, "cache health check failed, retrying");
                    if attempt < CACHE_PROBE_ATTEMPTS {
                        tokio::time::sleep(CACHE_PROBE_DELAY).await;
                    }
                }
            }
        }

        Err(format!(
            "cache health check failed after {CACHE_PROBE_ATTEMPTS} attempts: {last_error}"
        )
        .into())
    }
}

async fn run_task(task: Arc<dyn PeriodicTask>, token: CancellationToken) {
    let interval = task.interval();

    let execute = |token: CancellationToken| {
        let task = Arc::clone(&task);
        async move {
            info!(task = task.name(), "running periodic task");
            if let Err(e) = task.run(&token).await {
                error!(task = task.name(), error = %e, "periodic task failed");
            }
        }
    };

    if interval.is_zero() {
        execute(token).await;
        return;
    }

    // First run happens immediately; the ticker paces the rest.
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    execute(token.clone()).await;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!(task = task.name(), "stopping periodic task");
                return;
            }
            _ = ticker.tick() => {
                execute(token.clone()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use usernaut_cache::memory::{MemoryCache, MemoryConfig};

    struct CountingTask {
        name: String,
        interval: Duration,
        runs: AtomicU32,
    }

    impl CountingTask {
        fn new(interval: Duration) -> Arc<Self> {
            Arc::new(Self {
                name: "counting".to_string(),
                interval,
                runs: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl PeriodicTask for CountingTask {
        fn name(&self) -> &str {
            &self.name
        }

        fn interval(&self) -> Duration {
            self.interval
        }

        async fn run(&self, _token: &CancellationToken) -> Result<(), TaskError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn manager() -> (PeriodicTaskManager, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new(&MemoryConfig::default()));
        (PeriodicTaskManager::new(cache.clone()), cache)
    }

    #[tokio::test]
    async fn test_zero_interval_runs_once() {
        let (mut mgr, _cache) = manager();
        let task = CountingTask::new(Duration::ZERO);
        mgr.add_task(task.clone());

        let token = CancellationToken::new();
        let handles = mgr.start(token.clone()).await.unwrap();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_interval_task_repeats_until_cancelled() {
        let (mut mgr, _cache) = manager();
        let task = CountingTask::new(Duration::from_millis(20));
        mgr.add_task(task.clone());

        let token = CancellationToken::new();
        let handles = mgr.start(token.clone()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(90)).await;
        token.cancel();
        for handle in handles {
            handle.await.unwrap();
        }

        let runs = task.runs.load(Ordering::SeqCst);
        assert!(runs >= 2, "expected repeated runs, got {runs}");
    }

    #[tokio::test]
    async fn test_start_gates_on_cache_probe() {
        let (mgr, cache) = manager();
        let token = CancellationToken::new();
        mgr.start(token).await.unwrap();

        // The probe key cleans up after itself.
        let leftovers = cache.get_by_pattern("health_check_*").await.unwrap();
        assert!(leftovers.is_empty());
    }
}
