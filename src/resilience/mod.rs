// ABOUTME: Resilience layer protecting task execution from cascading failure
// ABOUTME: Bulkhead isolation, adaptive timeouts, and SLA compliance tracking

//! Fault containment for task execution.
//!
//! Three cooperating mechanisms:
//!
//! - **Bulkheads**: named compartments with independent capacity and failure
//!   accounting; an unhealthy compartment rejects work without touching its
//!   neighbors.
//! - **Adaptive timeouts**: per-operation deadlines derived from rolling
//!   execution-duration statistics instead of fixed constants.
//! - **SLA tracking**: per-service availability/response-time/error-rate/
//!   throughput windows compared against configured targets, with an
//!   append-only violation log.
//!
//! Each mechanism is independently usable; the orchestrator wires all three
//! around every task attempt.

pub mod bulkhead;
pub mod error;
pub mod sla;
pub mod timeout;

pub use bulkhead::{
    Bulkhead, BulkheadError, Compartment, CompartmentConfig, CompartmentState, CompartmentStats,
};
pub use error::{ResilienceError, Result};
pub use sla::{ServiceMetrics, SlaMetric, SlaReport, SlaTracker, SlaViolation};
pub use timeout::{TimeoutConfig, TimeoutManager};
