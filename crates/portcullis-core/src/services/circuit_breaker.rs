//! Circuit breaker implementation for upstream service protection.
//!
//! Each upstream gets its own breaker, tracked by [`CircuitBreakerRegistry`].
//! A breaker opens after `failure_threshold` consecutive failures, fails
//! fast while open, and after `reset_timeout` allows exactly one probe
//! request through (HalfOpen); that probe's outcome decides whether the
//! circuit closes or reopens. The single-probe-in-flight rule is enforced
//! with a compare-and-swap on `half_open_probe_in_flight` rather than a lock,
//! so concurrent callers racing into HalfOpen never send more than one
//! probe at a time.

use dashmap::DashMap;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Thresholds and timeouts controlling breaker transitions.
///
/// `failure_threshold: 5` and `reset_timeout: 30s` are the gateway-mandated
/// defaults; unlike a generic breaker, HalfOpen always needs exactly one
/// success to close (there is no `success_threshold` — a single successful
/// probe is conclusive).
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u64,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_secs(30) }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU64,
    half_open_probe_in_flight: AtomicBool,
    last_failure_time: RwLock<Option<Instant>>,
    name: String,
}

impl CircuitBreaker {
    pub fn new(name: String, config: CircuitBreakerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU64::new(0),
            half_open_probe_in_flight: AtomicBool::new(false),
            last_failure_time: RwLock::new(None),
            name,
        })
    }

    /// Executes `operation` under breaker protection. Returns
    /// `CircuitBreakerError::CircuitOpen` without running `operation` at all
    /// when the circuit is open, or when it's HalfOpen and another probe is
    /// already in flight.
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        let probe_claimed = match self.admit().await {
            Admission::Rejected => return Err(CircuitBreakerError::CircuitOpen),
            Admission::Allowed { claimed_half_open_probe } => claimed_half_open_probe,
        };

        match operation.await {
            Ok(result) => {
                self.on_success(probe_claimed).await;
                Ok(result)
            }
            Err(error) => {
                self.on_failure(probe_claimed).await;
                Err(CircuitBreakerError::OperationFailed(error))
            }
        }
    }

    async fn admit(&self) -> Admission {
        match CircuitState::from(self.state.load(Ordering::Acquire)) {
            CircuitState::Closed => Admission::Allowed { claimed_half_open_probe: false },
            CircuitState::HalfOpen => {
                // CAS: only the caller that flips false->true gets to send the probe.
                if self
                    .half_open_probe_in_flight
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    Admission::Allowed { claimed_half_open_probe: true }
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::Open => {
                let last_failure = *self.last_failure_time.read().await;
                match last_failure {
                    Some(at) if at.elapsed() >= self.config.reset_timeout => {
                        self.transition_to_half_open().await;
                        // Re-check: the transition just happened, try to claim the probe.
                        if self
                            .half_open_probe_in_flight
                            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                            .is_ok()
                        {
                            Admission::Allowed { claimed_half_open_probe: true }
                        } else {
                            Admission::Rejected
                        }
                    }
                    _ => Admission::Rejected,
                }
            }
        }
    }

    async fn on_success(&self, was_half_open_probe: bool) {
        if was_half_open_probe {
            self.transition_to_closed().await;
        } else {
            self.failure_count.store(0, Ordering::Relaxed);
        }
    }

    async fn on_failure(&self, was_half_open_probe: bool) {
        if was_half_open_probe {
            self.transition_to_open().await;
            return;
        }

        match CircuitState::from(self.state.load(Ordering::Acquire)) {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= self.config.failure_threshold {
                    self.transition_to_open().await;
                }
            }
            CircuitState::Open => {
                *self.last_failure_time.write().await = Some(Instant::now());
            }
            CircuitState::HalfOpen => {
                debug!("failure recorded for {} outside the claimed probe slot", self.name);
            }
        }
    }

    async fn transition_to_open(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        self.half_open_probe_in_flight.store(false, Ordering::Release);
        *self.last_failure_time.write().await = Some(Instant::now());
        warn!("circuit breaker '{}' opened", self.name);
    }

    async fn transition_to_half_open(&self) {
        self.state.store(CircuitState::HalfOpen as u8, Ordering::Release);
        info!("circuit breaker '{}' half-open, awaiting probe", self.name);
    }

    async fn transition_to_closed(&self) {
        self.state.store(CircuitState::Closed as u8, Ordering::Release);
        self.failure_count.store(0, Ordering::Relaxed);
        self.half_open_probe_in_flight.store(false, Ordering::Release);
        info!("circuit breaker '{}' closed - upstream recovered", self.name);
    }

    pub fn get_state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn get_failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }
}

enum Admission {
    Allowed { claimed_half_open_probe: bool },
    Rejected,
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    CircuitOpen,
    #[error("operation failed: {0}")]
    OperationFailed(E),
}

/// Per-upstream circuit breaker table, lazily populated on first use.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { breakers: DashMap::new(), config }
    }

    pub fn get_or_insert(&self, upstream: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(upstream.to_string())
            .or_insert_with(|| CircuitBreaker::new(upstream.to_string(), self.config.clone()))
            .clone()
    }

    /// Snapshot of `(state, failure_count)` per upstream, for `/metrics`.
    pub fn snapshot(&self) -> Vec<(String, CircuitState, u64)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().get_state(), entry.value().get_failure_count()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new(
            "svc".to_string(),
            CircuitBreakerConfig { failure_threshold: 3, reset_timeout: Duration::from_secs(30) },
        );

        for _ in 0..3 {
            let _ = breaker.call(async { Err::<(), _>("boom") }).await;
        }

        assert_eq!(breaker.get_state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn stays_closed_below_threshold() {
        let breaker = CircuitBreaker::new(
            "svc".to_string(),
            CircuitBreakerConfig { failure_threshold: 5, reset_timeout: Duration::from_secs(30) },
        );

        for _ in 0..4 {
            let _ = breaker.call(async { Err::<(), _>("boom") }).await;
        }

        assert_eq!(breaker.get_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn open_circuit_fails_fast_without_running_operation() {
        let breaker = CircuitBreaker::new(
            "svc".to_string(),
            CircuitBreakerConfig { failure_threshold: 1, reset_timeout: Duration::from_secs(300) },
        );

        let _ = breaker.call(async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.get_state(), CircuitState::Open);

        let mut ran = false;
        let result = breaker
            .call(async {
                ran = true;
                Ok::<_, &str>(())
            })
            .await;

        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen)));
        assert!(!ran);
    }

    #[tokio::test]
    async fn half_open_probe_success_closes_circuit() {
        let breaker = CircuitBreaker::new(
            "svc".to_string(),
            CircuitBreakerConfig { failure_threshold: 1, reset_timeout: Duration::from_millis(10) },
        );

        let _ = breaker.call(async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.get_state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = breaker.call(async { Ok::<_, &str>("recovered") }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.get_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn registry_keeps_independent_breakers_per_upstream() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_secs(30),
        });

        let orders = registry.get_or_insert("orders");
        let _ = orders.call(async { Err::<(), _>("boom") }).await;

        let users = registry.get_or_insert("users");

        assert_eq!(orders.get_state(), CircuitState::Open);
        assert_eq!(users.get_state(), CircuitState::Closed);
    }
}
