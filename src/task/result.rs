// ABOUTME: Task execution result types and failure classification
// ABOUTME: Defines the terminal record produced for every driven task

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use super::error::TaskError;
use super::state::TaskState;

/// Classification of a task failure, used by dependents, the bulkhead, and
/// SLA accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Execution,
    Timeout,
    CompartmentUnavailable,
    DependencyFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Execution => write!(f, "execution"),
            Self::Timeout => write!(f, "timeout"),
            Self::CompartmentUnavailable => write!(f, "compartment_unavailable"),
            Self::DependencyFailed => write!(f, "dependency_failed"),
        }
    }
}

/// Structured failure detail carried inside a [`TaskResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind,
            FailureKind::Validation | FailureKind::DependencyFailed
        )
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<TaskError> for TaskFailure {
    fn from(error: TaskError) -> Self {
        match &error {
            TaskError::Validation(message) => {
                Self::new(FailureKind::Validation, message.clone())
            }
            TaskError::Execution(_) | TaskError::Context(_) => {
                Self::new(FailureKind::Execution, error.to_string())
            }
        }
    }
}

/// Terminal record of a single driven task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub name: String,
    pub category: String,
    pub state: TaskState,
    pub success: bool,
    pub payload: Option<Value>,
    pub error: Option<TaskFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: f64,
    pub retries_used: u32,
    pub metadata: HashMap<String, String>,
}

impl TaskResult {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            state: TaskState::Created,
            success: false,
            payload: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0.0,
            retries_used: 0,
            metadata: HashMap::new(),
        }
    }

    pub fn mark_completed(&mut self, payload: Option<Value>, duration: Duration) {
        self.state = TaskState::Completed;
        self.success = true;
        self.payload = payload;
        self.error = None;
        self.finished_at = Some(Utc::now());
        self.duration_ms = duration.as_secs_f64() * 1000.0;
    }

    pub fn mark_failed(&mut self, failure: TaskFailure, duration: Duration) {
        self.state = TaskState::Failed;
        self.success = false;
        self.error = Some(failure);
        self.finished_at = Some(Utc::now());
        self.duration_ms = duration.as_secs_f64() * 1000.0;
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}
