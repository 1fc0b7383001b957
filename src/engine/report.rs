// ABOUTME: Aggregated results of a full orchestration run
// ABOUTME: Per-task results keyed by name with summary and overall status

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::task::{FailureKind, TaskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    PartialSuccess,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::PartialSuccess => write!(f, "partial_success"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub dependency_failed: usize,
    pub total_retries: u32,
    pub success_rate: f64,
}

/// Complete record of one `execute_all` run. Always contains a result for
/// every registered task, failures included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub status: RunStatus,
    pub results: IndexMap<String, TaskResult>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            duration: None,
            status: RunStatus::Running,
            results: IndexMap::new(),
            summary: RunSummary::default(),
        }
    }

    pub fn insert(&mut self, result: TaskResult) {
        self.results.insert(result.name.clone(), result);
    }

    pub fn get(&self, name: &str) -> Option<&TaskResult> {
        self.results.get(name)
    }

    pub fn has_failures(&self) -> bool {
        self.results.values().any(|r| !r.success)
    }

    pub fn mark_completed(&mut self) {
        let finished = Utc::now();
        self.finished_at = Some(finished);
        self.duration = Some(
            (finished - self.started_at)
                .to_std()
                .unwrap_or(Duration::ZERO),
        );
        self.update_summary();
        self.update_status();
    }

    fn update_summary(&mut self) {
        let total = self.results.len();
        let succeeded = self.results.values().filter(|r| r.success).count();
        let dependency_failed = self
            .results
            .values()
            .filter(|r| r.failure_kind() == Some(FailureKind::DependencyFailed))
            .count();
        let failed = total - succeeded - dependency_failed;
        let total_retries = self.results.values().map(|r| r.retries_used).sum();

        let success_rate = if total > 0 {
            (succeeded as f64 / total as f64) * 100.0
        } else {
            100.0
        };

        self.summary = RunSummary {
            total_tasks: total,
            succeeded,
            failed,
            dependency_failed,
            total_retries,
            success_rate,
        };
    }

    fn update_status(&mut self) {
        let any_failed = self.results.values().any(|r| !r.success);
        let any_succeeded = self.results.values().any(|r| r.success);

        self.status = match (any_failed, any_succeeded) {
            (false, _) => RunStatus::Success,
            (true, false) => RunStatus::Failed,
            (true, true) => RunStatus::PartialSuccess,
        };
    }
}
