// ABOUTME: Task lifecycle state machine
// ABOUTME: Defines task states and the legal transitions between them

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a task.
///
/// Transitions are monotonic except for the bounded `Executing -> Retrying ->
/// Executing` cycle. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Created,
    Validating,
    Executing,
    Retrying,
    Completed,
    Failed,
}

impl TaskState {
    /// Check if this is a terminal state (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check if the task is actively being processed.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Validating | Self::Executing | Self::Retrying)
    }

    /// Whether moving from this state to `next` is a legal transition.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Validating)
                | (Self::Created, Self::Failed)
                | (Self::Validating, Self::Executing)
                | (Self::Validating, Self::Failed)
                | (Self::Executing, Self::Completed)
                | (Self::Executing, Self::Retrying)
                | (Self::Executing, Self::Failed)
                | (Self::Retrying, Self::Executing)
                | (Self::Retrying, Self::Failed)
        )
    }

    /// Advance to `next` when legal. Illegal transitions are a driver bug;
    /// they are rejected and logged rather than applied.
    pub fn advance(&mut self, next: TaskState) {
        if self.can_transition_to(next) {
            *self = next;
        } else {
            debug_assert!(false, "illegal task state transition {self} -> {next}");
            tracing::error!(from = %self, to = %next, "illegal task state transition ignored");
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Validating => write!(f, "validating"),
            Self::Executing => write!(f, "executing"),
            Self::Retrying => write!(f, "retrying"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "validating" => Ok(Self::Validating),
            "executing" => Ok(Self::Executing),
            "retrying" => Ok(Self::Retrying),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid task state: {s}")),
        }
    }
}
