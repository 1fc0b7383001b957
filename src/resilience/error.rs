// ABOUTME: Error types for the resilience layer
// ABOUTME: Fail-fast rejections and deadline expirations

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResilienceError {
    #[error("compartment '{name}' is unavailable")]
    CompartmentUnavailable { name: String },

    #[error("unknown compartment: {name}")]
    UnknownCompartment { name: String },

    #[error("operation '{operation}' timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },
}

pub type Result<T> = std::result::Result<T, ResilienceError>;
