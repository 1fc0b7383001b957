// ABOUTME: Error types for shared context operations
// ABOUTME: Defines rejection errors for non-serializable context values

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("invalid value for key '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ContextError>;
