// ABOUTME: SLA target tracking and violation reporting per service
// ABOUTME: Maintains rolling operation samples and compares them against configured targets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

/// SLA dimensions a service can be held to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaMetric {
    /// Minimum fraction of successful operations (0.0–1.0).
    Availability,
    /// Maximum average response time, in milliseconds.
    ResponseTime,
    /// Maximum fraction of failed operations (0.0–1.0).
    ErrorRate,
    /// Minimum operations per second over the window.
    Throughput,
}

impl fmt::Display for SlaMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Availability => write!(f, "availability"),
            Self::ResponseTime => write!(f, "response_time"),
            Self::ErrorRate => write!(f, "error_rate"),
            Self::Throughput => write!(f, "throughput"),
        }
    }
}

/// A recorded breach of a configured target. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaViolation {
    pub service: String,
    pub metric: SlaMetric,
    pub actual: f64,
    pub target: f64,
    pub timestamp: DateTime<Utc>,
}

/// Current computed metrics for a service's rolling window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceMetrics {
    pub availability: f64,
    pub avg_response_time_ms: f64,
    pub error_rate: f64,
    pub throughput_per_sec: f64,
    pub sample_count: usize,
}

/// Compliance report for one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaReport {
    pub service: String,
    pub metrics: ServiceMetrics,
    pub compliant: bool,
    pub violations: Vec<SlaViolation>,
}

#[derive(Debug, Clone)]
struct Sample {
    success: bool,
    response_time: Duration,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ServiceRecord {
    targets: HashMap<SlaMetric, f64>,
    samples: VecDeque<Sample>,
    violations: Vec<SlaViolation>,
}

/// Records per-service operation outcomes and emits violations when the
/// rolling window breaches a configured target.
#[derive(Debug)]
pub struct SlaTracker {
    window_limit: usize,
    services: RwLock<HashMap<String, ServiceRecord>>,
}

impl Default for SlaTracker {
    fn default() -> Self {
        Self::new(256)
    }
}

impl SlaTracker {
    pub fn new(window_limit: usize) -> Self {
        Self {
            window_limit,
            services: RwLock::new(HashMap::new()),
        }
    }

    /// Store or overwrite a target for a service.
    pub async fn set_target(&self, service: &str, metric: SlaMetric, target: f64) {
        let mut services = self.services.write().await;
        services
            .entry(service.to_string())
            .or_default()
            .targets
            .insert(metric, target);
    }

    /// Append an operation sample and re-evaluate the service's targets,
    /// recording a violation for every breach.
    pub async fn record_operation(&self, service: &str, success: bool, response_time: Duration) {
        self.record_operation_at(service, success, response_time, Utc::now())
            .await
    }

    pub async fn record_operation_at(
        &self,
        service: &str,
        success: bool,
        response_time: Duration,
        timestamp: DateTime<Utc>,
    ) {
        let mut services = self.services.write().await;
        let record = services.entry(service.to_string()).or_default();

        record.samples.push_back(Sample {
            success,
            response_time,
            timestamp,
        });
        while record.samples.len() > self.window_limit {
            record.samples.pop_front();
        }

        let metrics = compute_metrics(&record.samples);
        for (&metric, &target) in &record.targets {
            let actual = metric_value(&metrics, metric);
            if is_breach(metric, actual, target) {
                warn!(
                    service,
                    metric = %metric,
                    actual,
                    target,
                    "SLA target violated"
                );
                record.violations.push(SlaViolation {
                    service: service.to_string(),
                    metric,
                    actual,
                    target,
                    timestamp,
                });
            }
        }
    }

    /// Compliance report for one service, if it has been seen.
    pub async fn report(&self, service: &str) -> Option<SlaReport> {
        let services = self.services.read().await;
        services.get(service).map(|record| build_report(service, record))
    }

    /// Compliance reports for every tracked service.
    pub async fn reports(&self) -> Vec<SlaReport> {
        let services = self.services.read().await;
        let mut reports: Vec<SlaReport> = services
            .iter()
            .map(|(service, record)| build_report(service, record))
            .collect();
        reports.sort_by(|a, b| a.service.cmp(&b.service));
        reports
    }
}

fn build_report(service: &str, record: &ServiceRecord) -> SlaReport {
    let metrics = compute_metrics(&record.samples);
    let compliant = record.targets.iter().all(|(&metric, &target)| {
        !is_breach(metric, metric_value(&metrics, metric), target)
    });

    SlaReport {
        service: service.to_string(),
        metrics,
        compliant,
        violations: record.violations.clone(),
    }
}

fn compute_metrics(samples: &VecDeque<Sample>) -> ServiceMetrics {
    let total = samples.len();
    if total == 0 {
        return ServiceMetrics::default();
    }

    let successes = samples.iter().filter(|s| s.success).count();
    let availability = successes as f64 / total as f64;
    let avg_response_time_ms = samples
        .iter()
        .map(|s| s.response_time.as_secs_f64() * 1000.0)
        .sum::<f64>()
        / total as f64;

    // Window span clamped to one second so a burst of samples with identical
    // timestamps still yields a finite rate.
    let span = samples
        .back()
        .zip(samples.front())
        .map(|(last, first)| (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0)
        .unwrap_or(0.0)
        .max(1.0);

    ServiceMetrics {
        availability,
        avg_response_time_ms,
        error_rate: 1.0 - availability,
        throughput_per_sec: total as f64 / span,
        sample_count: total,
    }
}

fn metric_value(metrics: &ServiceMetrics, metric: SlaMetric) -> f64 {
    match metric {
        SlaMetric::Availability => metrics.availability,
        SlaMetric::ResponseTime => metrics.avg_response_time_ms,
        SlaMetric::ErrorRate => metrics.error_rate,
        SlaMetric::Throughput => metrics.throughput_per_sec,
    }
}

fn is_breach(metric: SlaMetric, actual: f64, target: f64) -> bool {
    match metric {
        SlaMetric::Availability | SlaMetric::Throughput => actual < target,
        SlaMetric::ResponseTime | SlaMetric::ErrorRate => actual > target,
    }
}
