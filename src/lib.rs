// ABOUTME: Main library module for the convoy orchestration engine
// ABOUTME: Exports all core modules and provides the public API

pub mod context;
pub mod engine;
pub mod resilience;
pub mod task;

// Re-export commonly used types
pub use context::{ContextEntry, ContextError, SharedContext};
pub use engine::{
    DependencyGraph, EngineError, ErrorHandler, Orchestrator, RunReport, RunStatus, RunSummary,
};
pub use resilience::{
    Bulkhead, BulkheadError, CompartmentConfig, CompartmentState, CompartmentStats,
    ResilienceError, ServiceMetrics, SlaMetric, SlaReport, SlaTracker, SlaViolation,
    TimeoutConfig, TimeoutManager,
};
pub use task::{
    FailureKind, ResourceMonitored, RetryPolicy, Task, TaskConfig, TaskError, TaskFailure,
    TaskOutput, TaskParams, TaskResult, TaskState, Traced,
};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
