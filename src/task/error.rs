// ABOUTME: Error types raised from inside task lifecycle callbacks
// ABOUTME: Distinguishes validation rejections from execution failures

use thiserror::Error;

use crate::context::ContextError;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("context error: {0}")]
    Context(#[from] ContextError),
}

impl TaskError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;
