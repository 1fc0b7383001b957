// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides reusable task implementations for orchestration scenarios

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use convoy::task::{Result, TaskError};
use convoy::{SharedContext, Task, TaskOutput, TaskParams};

/// Succeeds immediately with a fixed payload.
pub struct EchoTask {
    payload: Value,
    category: String,
}

impl EchoTask {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            category: "general".to_string(),
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }
}

#[async_trait]
impl Task for EchoTask {
    async fn execute(&self, _context: &SharedContext, _params: &TaskParams) -> Result<TaskOutput> {
        Ok(TaskOutput::with_payload(self.payload.clone()))
    }

    fn category(&self) -> &str {
        &self.category
    }
}

/// Always fails with an execution error, counting its attempts.
pub struct FailingTask {
    message: String,
    pub attempts: Arc<AtomicU32>,
}

impl FailingTask {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl Task for FailingTask {
    async fn execute(&self, _context: &SharedContext, _params: &TaskParams) -> Result<TaskOutput> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TaskError::execution(self.message.clone()))
    }
}

/// Fails until the given attempt number, then succeeds.
pub struct FlakyTask {
    succeed_on_attempt: u32,
    pub attempts: Arc<AtomicU32>,
}

impl FlakyTask {
    pub fn new(succeed_on_attempt: u32) -> Self {
        Self {
            succeed_on_attempt,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl Task for FlakyTask {
    async fn execute(&self, _context: &SharedContext, _params: &TaskParams) -> Result<TaskOutput> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt >= self.succeed_on_attempt {
            Ok(TaskOutput::with_payload(json!({ "attempt": attempt })))
        } else {
            Err(TaskError::execution(format!("flaky failure on attempt {attempt}")))
        }
    }
}

/// Sleeps for a fixed duration before succeeding.
pub struct SleepTask {
    duration: Duration,
}

impl SleepTask {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Task for SleepTask {
    async fn execute(&self, _context: &SharedContext, _params: &TaskParams) -> Result<TaskOutput> {
        tokio::time::sleep(self.duration).await;
        Ok(TaskOutput::with_payload(json!("slept")))
    }
}

/// Writes a key into the shared context, then echoes the value written.
pub struct WritingTask {
    key: String,
    value: Value,
}

impl WritingTask {
    pub fn new(key: &str, value: Value) -> Self {
        Self {
            key: key.to_string(),
            value,
        }
    }
}

#[async_trait]
impl Task for WritingTask {
    async fn execute(&self, context: &SharedContext, _params: &TaskParams) -> Result<TaskOutput> {
        context
            .set(self.key.clone(), self.value.clone(), "writing_task")
            .await?;
        Ok(TaskOutput::with_payload(self.value.clone()))
    }
}

/// Reads an upstream task's published result and fails when it is missing.
pub struct ReadingTask {
    key: String,
}

impl ReadingTask {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl Task for ReadingTask {
    async fn execute(&self, context: &SharedContext, _params: &TaskParams) -> Result<TaskOutput> {
        match context.get(&self.key).await {
            Some(value) => Ok(TaskOutput::with_payload(value)),
            None => Err(TaskError::execution(format!("missing context key '{}'", self.key))),
        }
    }
}

/// Rejects validation without ever executing.
pub struct InvalidTask {
    pub executed: Arc<AtomicU32>,
}

impl InvalidTask {
    pub fn new() -> Self {
        Self {
            executed: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl Task for InvalidTask {
    async fn validate(&self, _context: &SharedContext, _params: &TaskParams) -> Result<bool> {
        Ok(false)
    }

    async fn execute(&self, _context: &SharedContext, _params: &TaskParams) -> Result<TaskOutput> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(TaskOutput::empty())
    }
}
