//! Resilience guard for backend calls.
//!
//! Circuit breaker with hystrix-shaped semantics: a rolling window of request
//! outcomes trips the circuit once a minimum request volume is reached and
//! the error percentage crosses the threshold; an open circuit rejects calls
//! until the sleep window elapses, then lets probes through half-open.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, warn};

use crate::config::ResiliencyConfig;
use crate::error::{ConnectorError, ConnectorResult};

/// Width of the rolling outcome window.
const WINDOW_MILLIS: u64 = 10_000;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Tripped; calls are rejected until the sleep window elapses.
    Open,
    /// Probing; a success closes the circuit, a failure reopens it.
    HalfOpen,
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Per-backend circuit breaker with bounded concurrency.
pub struct CircuitBreaker {
    backend: String,
    config: ResiliencyConfig,
    state: RwLock<CircuitState>,
    permits: Arc<Semaphore>,
    window_start: AtomicU64,
    total: AtomicU32,
    failures: AtomicU32,
    opened_at: AtomicU64,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(backend: impl Into<String>, config: ResiliencyConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));
        Self {
            backend: backend.into(),
            config,
            state: RwLock::new(CircuitState::Closed),
            permits,
            window_start: AtomicU64::new(now_millis()),
            total: AtomicU32::new(0),
            failures: AtomicU32::new(0),
            opened_at: AtomicU64::new(0),
        }
    }

    /// The backend instance this breaker protects.
    #[must_use]
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Current state, accounting for sleep-window expiry.
    pub async fn state(&self) -> CircuitState {
        self.maybe_half_open().await;
        *self.state.read().await
    }

    /// Whether a call may proceed right now.
    pub async fn is_allowed(&self) -> bool {
        !matches!(self.state().await, CircuitState::Open)
    }

    /// Record a successful call.
    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        match *state {
            CircuitState::Closed => {
                self.roll_window();
                self.total.fetch_add(1, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                debug!(backend = %self.backend, "circuit closing after successful probe");
                *state = CircuitState::Closed;
                self.reset_window();
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    pub async fn record_failure(&self) {
        let mut state = self.state.write().await;
        match *state {
            CircuitState::Closed => {
                self.roll_window();
                let total = self.total.fetch_add(1, Ordering::SeqCst) + 1;
                let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                if total >= self.config.request_volume_threshold
                    && failures * 100 / total >= self.config.error_percent_threshold
                {
                    warn!(
                        backend = %self.backend,
                        failures, total, "error threshold crossed, circuit opening"
                    );
                    *state = CircuitState::Open;
                    self.opened_at.store(now_millis(), Ordering::SeqCst);
                }
            }
            CircuitState::HalfOpen => {
                warn!(backend = %self.backend, "probe failed, circuit reopening");
                *state = CircuitState::Open;
                self.opened_at.store(now_millis(), Ordering::SeqCst);
            }
            CircuitState::Open => {
                self.opened_at.store(now_millis(), Ordering::SeqCst);
            }
        }
    }

    /// Execute an operation under the breaker, the concurrency bound and the
    /// command timeout.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> ConnectorResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ConnectorResult<T>>,
    {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ConnectorError::CircuitOpen {
                backend: self.backend.clone(),
            })?;

        if !self.is_allowed().await {
            return Err(ConnectorError::CircuitOpen {
                backend: self.backend.clone(),
            });
        }

        let timeout = Duration::from_millis(self.config.timeout);
        match tokio::time::timeout(timeout, operation()).await {
            Err(_) => {
                self.record_failure().await;
                Err(ConnectorError::Timeout {
                    timeout_ms: self.config.timeout,
                })
            }
            Ok(Ok(value)) => {
                self.record_success().await;
                Ok(value)
            }
            Ok(Err(e)) => {
                if e.is_transient() {
                    self.record_failure().await;
                } else {
                    self.record_success().await;
                }
                Err(e)
            }
        }
    }

    fn roll_window(&self) {
        let now = now_millis();
        let start = self.window_start.load(Ordering::SeqCst);
        if now.saturating_sub(start) >= WINDOW_MILLIS {
            self.window_start.store(now, Ordering::SeqCst);
            self.total.store(0, Ordering::SeqCst);
            self.failures.store(0, Ordering::SeqCst);
        }
    }

    fn reset_window(&self) {
        self.window_start.store(now_millis(), Ordering::SeqCst);
        self.total.store(0, Ordering::SeqCst);
        self.failures.store(0, Ordering::SeqCst);
    }

    async fn maybe_half_open(&self) {
        {
            let state = self.state.read().await;
            if *state != CircuitState::Open {
                return;
            }
        }

        let opened = self.opened_at.load(Ordering::SeqCst);
        if now_millis().saturating_sub(opened) < self.config.sleep_window {
            return;
        }

        let mut state = self.state.write().await;
        if *state == CircuitState::Open {
            debug!(backend = %self.backend, "sleep window elapsed, circuit half-open");
            *state = CircuitState::HalfOpen;
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("backend", &self.backend)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trippy_config() -> ResiliencyConfig {
        ResiliencyConfig {
            max_concurrent_requests: 2,
            request_volume_threshold: 3,
            sleep_window: 50,
            error_percent_threshold: 50,
            timeout: 200,
        }
    }

    #[tokio::test]
    async fn test_stays_closed_under_volume_threshold() {
        let breaker = CircuitBreaker::new("b", trippy_config());
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_opens_on_error_percentage() {
        let breaker = CircuitBreaker::new("b", trippy_config());
        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(!breaker.is_allowed().await);
    }

    #[tokio::test]
    async fn test_half_open_after_sleep_window_then_close() {
        let breaker = CircuitBreaker::new("b", trippy_config());
        for _ in 0..3 {
            breaker.record_failure().await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);

        breaker.record_success().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_probe_failure_reopens() {
        let breaker = CircuitBreaker::new("b", trippy_config());
        for _ in 0..3 {
            breaker.record_failure().await;
        }
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);

        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_execute_rejects_when_open() {
        let breaker = CircuitBreaker::new("b", trippy_config());
        for _ in 0..3 {
            breaker.record_failure().await;
        }

        let result: ConnectorResult<()> = breaker.execute(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(ConnectorError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn test_execute_times_out() {
        let breaker = CircuitBreaker::new("b", trippy_config());
        let result: ConnectorResult<()> = breaker
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ConnectorError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_permanent_error_does_not_trip() {
        let breaker = CircuitBreaker::new("b", trippy_config());
        for _ in 0..5 {
            let _: ConnectorResult<()> = breaker
                .execute(|| async {
                    Err(ConnectorError::AlreadyExists {
                        identifier: "t".to_string(),
                    })
                })
                .await;
        }
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }
}
