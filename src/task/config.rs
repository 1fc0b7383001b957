// ABOUTME: Per-task execution configuration and retry backoff policy
// ABOUTME: Controls retry counts, backoff growth, and optional fixed timeouts

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry backoff policy.
///
/// The delay before retry `n` (1-based) is `initial_delay ×
/// backoff_multiplier^(n-1)`, capped at `max_delay`. `max_retries` bounds the
/// number of re-executions after the initial attempt: a task configured with
/// `max_retries = n` is attempted at most `n + 1` times.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry (1-based), capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(exponent as i32);
        let delay = Duration::from_millis(delay_ms as u64);

        delay.min(self.max_delay)
    }

    /// Exponential backoff with the given growth factor.
    pub fn exponential(max_retries: u32, initial_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_delay,
            backoff_multiplier: multiplier,
            ..Self::default()
        }
    }

    /// Fixed delay between every retry.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay: delay,
            backoff_multiplier: 1.0,
            max_delay: delay,
        }
    }
}

/// Execution configuration attached to a registered task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    pub retry: RetryPolicy,
    /// Fixed deadline for each attempt. When unset, the orchestrator's
    /// timeout manager derives an adaptive deadline from execution history.
    pub timeout: Option<Duration>,
}

impl TaskConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(1),
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_cap() {
        let policy = RetryPolicy {
            max_retries: 8,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(600),
        };

        assert_eq!(policy.delay_for(3), Duration::from_millis(600));
        assert_eq!(policy.delay_for(8), Duration::from_millis(600));
    }

    #[test]
    fn test_fixed_policy() {
        let policy = RetryPolicy::fixed(2, Duration::from_millis(50));
        assert_eq!(policy.delay_for(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for(2), Duration::from_millis(50));
    }

    #[test]
    fn test_config_builders() {
        let config = TaskConfig::new()
            .with_retries(4)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.retry.max_retries, 4);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }
}
