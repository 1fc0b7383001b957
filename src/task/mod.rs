// ABOUTME: Task trait and lifecycle support types
// ABOUTME: Defines the unit-of-work contract driven by the orchestrator

pub mod config;
pub mod error;
pub mod middleware;
pub mod result;
pub mod state;

pub use config::{RetryPolicy, TaskConfig};
pub use error::{Result, TaskError};
pub use middleware::{ResourceMonitored, Traced};
pub use result::{FailureKind, TaskFailure, TaskResult};
pub use state::TaskState;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::context::SharedContext;

/// Parameters handed to a task at execution time.
pub type TaskParams = HashMap<String, Value>;

/// Payload and metadata produced by a successful execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskOutput {
    pub payload: Option<Value>,
    pub metadata: HashMap<String, String>,
}

impl TaskOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_payload(payload: Value) -> Self {
        Self {
            payload: Some(payload),
            metadata: HashMap::new(),
        }
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }
}

/// A named, stateful unit of work.
///
/// Implementations are registered with the orchestrator together with their
/// dependencies; the orchestrator drives the validate/execute lifecycle.
/// Cross-cutting behavior (resource monitoring, tracing) composes by wrapping
/// a task in the [`middleware`] decorators at construction time.
#[async_trait]
pub trait Task: Send + Sync {
    /// Check preconditions against the shared context and parameters.
    ///
    /// Returning `Ok(false)` or an error aborts the task with a validation
    /// failure without consuming a retry.
    async fn validate(&self, _context: &SharedContext, _params: &TaskParams) -> Result<bool> {
        Ok(true)
    }

    /// Perform the unit of work.
    async fn execute(&self, context: &SharedContext, params: &TaskParams) -> Result<TaskOutput>;

    /// Grouping label, doubling as the SLA service name for this task.
    fn category(&self) -> &str {
        "general"
    }
}
