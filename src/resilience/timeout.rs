// ABOUTME: Adaptive timeout management from historical execution durations
// ABOUTME: Wraps operations with enforced deadlines derived from rolling statistics

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::error::ResilienceError;

/// Configuration for adaptive timeout derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Deadline used when an operation has no history and no override.
    pub default_timeout: Duration,
    /// Lower bound on adaptive deadlines.
    pub floor: Duration,
    /// Upper bound on adaptive deadlines.
    pub ceiling: Duration,
    /// `k` in `mean + k × stddev`.
    pub stddev_multiplier: f64,
    /// Maximum samples retained per operation.
    pub history_limit: usize,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            floor: Duration::from_millis(100),
            ceiling: Duration::from_secs(300),
            stddev_multiplier: 2.0,
            history_limit: 128,
        }
    }
}

/// Tracks per-operation execution durations and derives adaptive deadlines.
///
/// An operation with a configured override always uses it. Otherwise the
/// deadline is `mean + k × stddev` over the operation's rolling window,
/// clamped to `[floor, ceiling]`, falling back to the default when no history
/// exists.
#[derive(Debug, Default)]
pub struct TimeoutManager {
    config: TimeoutConfig,
    overrides: RwLock<HashMap<String, Duration>>,
    history: RwLock<HashMap<String, VecDeque<Duration>>>,
}

impl TimeoutManager {
    pub fn new(config: TimeoutConfig) -> Self {
        Self {
            config,
            overrides: RwLock::new(HashMap::new()),
            history: RwLock::new(HashMap::new()),
        }
    }

    /// Pin a fixed deadline for an operation, bypassing adaptive derivation.
    pub async fn set_timeout(&self, operation: &str, timeout: Duration) {
        let mut overrides = self.overrides.write().await;
        overrides.insert(operation.to_string(), timeout);
    }

    /// The deadline currently in effect for an operation.
    pub async fn get_timeout(&self, operation: &str) -> Duration {
        if let Some(timeout) = self.overrides.read().await.get(operation) {
            return *timeout;
        }

        let history = self.history.read().await;
        match history.get(operation) {
            Some(samples) if !samples.is_empty() => self.adaptive_timeout(samples),
            _ => self.config.default_timeout,
        }
    }

    fn adaptive_timeout(&self, samples: &VecDeque<Duration>) -> Duration {
        let secs: Vec<f64> = samples.iter().map(|d| d.as_secs_f64()).collect();
        let mean = secs.iter().sum::<f64>() / secs.len() as f64;
        let variance =
            secs.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / secs.len() as f64;
        let deadline = mean + self.config.stddev_multiplier * variance.sqrt();

        Duration::from_secs_f64(deadline)
            .clamp(self.config.floor, self.config.ceiling)
    }

    /// Record a completed execution's duration into the rolling window.
    pub async fn record(&self, operation: &str, duration: Duration) {
        let mut history = self.history.write().await;
        let samples = history.entry(operation.to_string()).or_default();
        samples.push_back(duration);
        while samples.len() > self.config.history_limit {
            samples.pop_front();
        }
    }

    pub async fn sample_count(&self, operation: &str) -> usize {
        let history = self.history.read().await;
        history.get(operation).map(|s| s.len()).unwrap_or(0)
    }

    /// Run `fut` under the operation's deadline.
    ///
    /// On expiry the call is abandoned and a timeout failure returned; no
    /// internal retry. On completion the actual duration feeds the adaptive
    /// history; abandoned attempts never do.
    pub async fn execute_with_timeout<F, T>(
        &self,
        operation: &str,
        fut: F,
    ) -> Result<T, ResilienceError>
    where
        F: Future<Output = T>,
    {
        let deadline = self.get_timeout(operation).await;
        let start = Instant::now();

        match tokio::time::timeout(deadline, fut).await {
            Ok(value) => {
                let elapsed = start.elapsed();
                self.record(operation, elapsed).await;
                debug!(operation, elapsed_ms = elapsed.as_millis() as u64, "operation completed");
                Ok(value)
            }
            Err(_) => {
                warn!(operation, timeout_ms = deadline.as_millis() as u64, "operation timed out");
                Err(ResilienceError::Timeout {
                    operation: operation.to_string(),
                    timeout: deadline,
                })
            }
        }
    }
}
