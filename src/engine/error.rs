// ABOUTME: Error types for graph construction and orchestration
// ABOUTME: Structural errors that abort resolution before any task runs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("duplicate task: {name}")]
    DuplicateTask { name: String },

    #[error("circular dependency detected: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("graph is sealed; cannot register task '{name}' after resolution")]
    GraphSealed { name: String },

    #[error("task not found: {name}")]
    TaskNotFound { name: String },

    #[error("task '{task}' is assigned to unknown compartment '{compartment}'")]
    UnknownCompartment { task: String, compartment: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
