// ABOUTME: Bulkhead isolation with per-compartment capacity and health tracking
// ABOUTME: Contains cascading failures by partitioning execution into compartments

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::ResilienceError;

/// Health states of a compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompartmentState {
    /// Full capacity admitted; a success resets the failure count.
    Healthy,
    /// Failure threshold reached; capacity is halved.
    Degraded,
    /// Isolation threshold reached; all work rejected until the recovery
    /// window elapses.
    Isolated,
    /// Recovery window elapsed; a single trial call probes the compartment.
    Recovering,
}

impl fmt::Display for CompartmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Isolated => write!(f, "isolated"),
            Self::Recovering => write!(f, "recovering"),
        }
    }
}

/// Configuration for a single compartment, supplied at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompartmentConfig {
    pub max_capacity: usize,
    pub failure_threshold: u32,
    pub isolation_threshold: u32,
    pub recovery_time: Duration,
}

impl Default for CompartmentConfig {
    fn default() -> Self {
        Self {
            max_capacity: 8,
            failure_threshold: 3,
            isolation_threshold: 5,
            recovery_time: Duration::from_secs(30),
        }
    }
}

/// Point-in-time view of a compartment, for external monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompartmentStats {
    pub state: CompartmentState,
    pub current_load: usize,
    pub max_capacity: usize,
    pub failure_count: u32,
    pub total_calls: u64,
    pub total_failures: u64,
    pub avg_call_duration_ms: f64,
}

/// Errors surfaced by compartment-protected execution.
#[derive(Debug, thiserror::Error)]
pub enum BulkheadError<E> {
    /// Admission was rejected; the operation was never invoked.
    #[error(transparent)]
    Rejected(ResilienceError),

    /// The operation ran and failed; the failure was recorded.
    #[error("operation failed: {0}")]
    Operation(E),
}

#[derive(Debug)]
struct CompartmentInner {
    state: CompartmentState,
    current_load: usize,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    total_calls: u64,
    total_failures: u64,
    total_duration: Duration,
}

/// An isolated capacity/failure-tracking partition.
///
/// Each compartment owns its own lock and counters; one compartment's state
/// never blocks another. Admission decisions are fail-fast: the lock is held
/// only to inspect and update counters, never across the protected operation.
#[derive(Debug)]
pub struct Compartment {
    name: String,
    config: CompartmentConfig,
    inner: Mutex<CompartmentInner>,
}

impl Compartment {
    pub fn new(name: impl Into<String>, config: CompartmentConfig) -> Self {
        let name = name.into();
        info!(
            compartment = %name,
            max_capacity = config.max_capacity,
            failure_threshold = config.failure_threshold,
            isolation_threshold = config.isolation_threshold,
            "compartment initialized"
        );

        Self {
            name,
            config,
            inner: Mutex::new(CompartmentInner {
                state: CompartmentState::Healthy,
                current_load: 0,
                failure_count: 0,
                last_failure_at: None,
                total_calls: 0,
                total_failures: 0,
                total_duration: Duration::ZERO,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> CompartmentState {
        self.inner.lock().await.state
    }

    /// Execute `op` under this compartment's capacity and health rules.
    ///
    /// Rejection fails fast with [`BulkheadError::Rejected`] without invoking
    /// `op`. The operation's outcome feeds the compartment state machine.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, BulkheadError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit().await.map_err(BulkheadError::Rejected)?;

        let start = Instant::now();
        let result = op().await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => self.record_success(duration).await,
            Err(_) => self.record_failure(duration).await,
        }

        result.map_err(BulkheadError::Operation)
    }

    /// Non-blocking admission check; increments the load on success.
    async fn admit(&self) -> Result<(), ResilienceError> {
        let mut inner = self.inner.lock().await;

        if inner.state == CompartmentState::Isolated {
            let elapsed = inner
                .last_failure_at
                .map(|at| at.elapsed() >= self.config.recovery_time)
                .unwrap_or(true);
            if elapsed {
                info!(compartment = %self.name, "recovery window elapsed, probing");
                inner.state = CompartmentState::Recovering;
            } else {
                return Err(ResilienceError::CompartmentUnavailable {
                    name: self.name.clone(),
                });
            }
        }

        let capacity = self.effective_capacity(inner.state);
        if inner.current_load >= capacity {
            debug!(
                compartment = %self.name,
                state = %inner.state,
                load = inner.current_load,
                capacity,
                "admission rejected at capacity"
            );
            return Err(ResilienceError::CompartmentUnavailable {
                name: self.name.clone(),
            });
        }

        inner.current_load += 1;
        Ok(())
    }

    fn effective_capacity(&self, state: CompartmentState) -> usize {
        match state {
            CompartmentState::Healthy => self.config.max_capacity,
            CompartmentState::Degraded => (self.config.max_capacity / 2).max(1),
            CompartmentState::Recovering => 1,
            CompartmentState::Isolated => 0,
        }
    }

    async fn record_success(&self, duration: Duration) {
        let mut inner = self.inner.lock().await;
        inner.current_load = inner.current_load.saturating_sub(1);
        inner.total_calls += 1;
        inner.total_duration += duration;

        match inner.state {
            CompartmentState::Healthy => {
                inner.failure_count = 0;
            }
            CompartmentState::Degraded => {
                inner.failure_count = inner.failure_count.saturating_sub(1);
                if inner.failure_count < self.config.failure_threshold {
                    info!(compartment = %self.name, "load shed succeeded, back to healthy");
                    inner.state = CompartmentState::Healthy;
                }
            }
            CompartmentState::Recovering => {
                info!(compartment = %self.name, "probe succeeded, compartment recovered");
                inner.state = CompartmentState::Healthy;
                inner.failure_count = 0;
                inner.last_failure_at = None;
            }
            CompartmentState::Isolated => {}
        }
    }

    async fn record_failure(&self, duration: Duration) {
        let mut inner = self.inner.lock().await;
        inner.current_load = inner.current_load.saturating_sub(1);
        inner.total_calls += 1;
        inner.total_failures += 1;
        inner.total_duration += duration;
        inner.failure_count += 1;
        inner.last_failure_at = Some(Instant::now());

        match inner.state {
            CompartmentState::Recovering => {
                warn!(compartment = %self.name, "probe failed, re-isolating");
                inner.state = CompartmentState::Isolated;
            }
            CompartmentState::Healthy | CompartmentState::Degraded => {
                if inner.failure_count >= self.config.isolation_threshold {
                    warn!(
                        compartment = %self.name,
                        failures = inner.failure_count,
                        "isolation threshold reached, rejecting all work"
                    );
                    inner.state = CompartmentState::Isolated;
                } else if inner.failure_count >= self.config.failure_threshold {
                    warn!(
                        compartment = %self.name,
                        failures = inner.failure_count,
                        "failure threshold reached, throttling capacity"
                    );
                    inner.state = CompartmentState::Degraded;
                }
            }
            CompartmentState::Isolated => {}
        }
    }

    pub async fn stats(&self) -> CompartmentStats {
        let inner = self.inner.lock().await;
        let avg_call_duration_ms = if inner.total_calls > 0 {
            inner.total_duration.as_secs_f64() * 1000.0 / inner.total_calls as f64
        } else {
            0.0
        };
        CompartmentStats {
            state: inner.state,
            current_load: inner.current_load,
            max_capacity: self.config.max_capacity,
            failure_count: inner.failure_count,
            total_calls: inner.total_calls,
            total_failures: inner.total_failures,
            avg_call_duration_ms,
        }
    }
}

/// Named set of independent compartments.
#[derive(Debug, Default)]
pub struct Bulkhead {
    compartments: HashMap<String, Arc<Compartment>>,
}

impl Bulkhead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_compartment(&mut self, name: impl Into<String>, config: CompartmentConfig) {
        let name = name.into();
        self.compartments
            .insert(name.clone(), Arc::new(Compartment::new(name, config)));
    }

    pub fn with_compartment(mut self, name: impl Into<String>, config: CompartmentConfig) -> Self {
        self.add_compartment(name, config);
        self
    }

    pub fn has_compartment(&self, name: &str) -> bool {
        self.compartments.contains_key(name)
    }

    pub fn compartment(&self, name: &str) -> Option<Arc<Compartment>> {
        self.compartments.get(name).cloned()
    }

    /// Execute `op` inside the named compartment.
    pub async fn execute<F, Fut, T, E>(&self, name: &str, op: F) -> Result<T, BulkheadError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let compartment = self.compartments.get(name).ok_or_else(|| {
            BulkheadError::Rejected(ResilienceError::UnknownCompartment {
                name: name.to_string(),
            })
        })?;

        compartment.execute(op).await
    }

    /// Per-compartment stats for external monitoring.
    pub async fn stats(&self) -> HashMap<String, CompartmentStats> {
        let mut stats = HashMap::new();
        for (name, compartment) in &self.compartments {
            stats.insert(name.clone(), compartment.stats().await);
        }
        stats
    }
}
