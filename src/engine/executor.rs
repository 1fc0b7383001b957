// ABOUTME: Orchestrator driving registered tasks through their lifecycle
// ABOUTME: Resolves dependency order and executes batches under resilience protection

use futures::future::join_all;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use super::error::{EngineError, Result};
use super::graph::DependencyGraph;
use super::report::RunReport;
use crate::context::SharedContext;
use crate::resilience::{Bulkhead, BulkheadError, ResilienceError, SlaTracker, TimeoutManager};
use crate::task::{
    FailureKind, Task, TaskConfig, TaskFailure, TaskOutput, TaskParams, TaskResult, TaskState,
};

struct RegisteredTask {
    task: Arc<dyn Task>,
    config: TaskConfig,
    compartment: Option<String>,
}

/// Callback invoked with every terminal task failure before it is reported.
pub type ErrorHandler = dyn Fn(&str, &TaskFailure) + Send + Sync;

/// Drives named, inter-dependent tasks through their lifecycle in dependency
/// order.
///
/// Tasks are registered explicitly together with their dependencies and
/// configuration; collaborators (shared context, bulkhead, timeout manager,
/// SLA tracker) are injected at construction. `execute_all` never fails for
/// individual task failures — it always returns a complete report — and only
/// errors on structural problems in the graph definition.
pub struct Orchestrator {
    graph: DependencyGraph,
    tasks: IndexMap<String, RegisteredTask>,
    context: SharedContext,
    timeouts: Arc<TimeoutManager>,
    bulkhead: Option<Arc<Bulkhead>>,
    sla: Option<Arc<SlaTracker>>,
    error_handler: Option<Arc<ErrorHandler>>,
    max_concurrent: usize,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            graph: DependencyGraph::new(),
            tasks: IndexMap::new(),
            context: SharedContext::new(),
            timeouts: Arc::new(TimeoutManager::default()),
            bulkhead: None,
            sla: None,
            error_handler: None,
            max_concurrent: 4,
        }
    }

    /// Share an existing context instead of the run-local default.
    pub fn with_context(mut self, context: SharedContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_timeout_manager(mut self, timeouts: Arc<TimeoutManager>) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_bulkhead(mut self, bulkhead: Arc<Bulkhead>) -> Self {
        self.bulkhead = Some(bulkhead);
        self
    }

    pub fn with_sla_tracker(mut self, sla: Arc<SlaTracker>) -> Self {
        self.sla = Some(sla);
        self
    }

    /// Receive every terminal task failure before it lands in the report.
    pub fn with_error_handler(mut self, handler: Arc<ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Register a task with default configuration.
    pub fn register(
        &mut self,
        name: &str,
        task: Arc<dyn Task>,
        dependencies: &[&str],
    ) -> Result<()> {
        self.register_with_config(name, task, dependencies, TaskConfig::default())
    }

    /// Register a task with explicit retry/timeout configuration.
    pub fn register_with_config(
        &mut self,
        name: &str,
        task: Arc<dyn Task>,
        dependencies: &[&str],
        config: TaskConfig,
    ) -> Result<()> {
        let deps: Vec<String> = dependencies.iter().map(|d| d.to_string()).collect();
        self.graph.add_task(name, deps)?;
        self.tasks.insert(
            name.to_string(),
            RegisteredTask {
                task,
                config,
                compartment: None,
            },
        );
        debug!(task = name, dependencies = dependencies.len(), "task registered");
        Ok(())
    }

    /// Route a task's execution through a bulkhead compartment.
    pub fn assign_compartment(&mut self, task: &str, compartment: &str) -> Result<()> {
        match self.tasks.get_mut(task) {
            Some(registered) => {
                registered.compartment = Some(compartment.to_string());
                Ok(())
            }
            None => Err(EngineError::TaskNotFound {
                name: task.to_string(),
            }),
        }
    }

    /// Resolve the execution order without running anything.
    pub fn resolve(&mut self) -> Result<Vec<String>> {
        self.graph.resolve()
    }

    /// Execute every registered task in dependency order.
    ///
    /// Structural errors (cycles, duplicates, unknown dependencies or
    /// compartments) abort before any task runs. Individual task failures are
    /// captured in the report; tasks whose dependencies failed are marked
    /// failed with a dependency-failed cause without executing, cascading
    /// transitively.
    #[instrument(skip_all)]
    pub async fn execute_all(
        &mut self,
        mut params: HashMap<String, TaskParams>,
    ) -> Result<RunReport> {
        let order = self.graph.resolve()?;
        let batches = self.graph.execution_batches()?;

        for (name, registered) in &self.tasks {
            if let Some(compartment) = &registered.compartment {
                let known = self
                    .bulkhead
                    .as_ref()
                    .map(|b| b.has_compartment(compartment))
                    .unwrap_or(false);
                if !known {
                    return Err(EngineError::UnknownCompartment {
                        task: name.clone(),
                        compartment: compartment.clone(),
                    });
                }
            }
        }

        // Fixed per-task deadlines pin the timeout manager; everything else
        // stays adaptive.
        for (name, registered) in &self.tasks {
            if let Some(timeout) = registered.config.timeout {
                self.timeouts.set_timeout(name, timeout).await;
            }
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        info!(
            run_id = %run_id,
            tasks = order.len(),
            batches = batches.len(),
            "starting orchestration run"
        );

        let mut report = RunReport::new(run_id.clone());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut failed: HashSet<String> = HashSet::new();

        for (batch_index, batch) in batches.iter().enumerate() {
            debug!(batch = batch_index + 1, size = batch.len(), "executing batch");

            let mut runnable = Vec::new();
            for name in batch {
                let blocked_by: Vec<String> = self
                    .graph
                    .dependencies(name)
                    .into_iter()
                    .filter(|dep| failed.contains(dep))
                    .collect();

                if blocked_by.is_empty() {
                    runnable.push(name.clone());
                    continue;
                }

                warn!(task = %name, blocked_by = ?blocked_by, "skipping task, dependency failed");
                let category = self
                    .tasks
                    .get(name)
                    .map(|r| r.task.category().to_string())
                    .unwrap_or_else(|| "general".to_string());
                let mut result = TaskResult::new(name.clone(), category);
                result.mark_failed(
                    TaskFailure::new(
                        FailureKind::DependencyFailed,
                        format!("dependency failed: {}", blocked_by.join(", ")),
                    ),
                    Duration::ZERO,
                );
                failed.insert(name.clone());
                self.record_outcome(&result).await;
                report.insert(result);
            }

            let futures: Vec<_> = runnable
                .iter()
                .filter_map(|name| {
                    self.tasks.get(name).map(|registered| {
                        let task_params = params.remove(name).unwrap_or_default();
                        self.run_task(name.clone(), registered, task_params, &semaphore)
                    })
                })
                .collect();

            for result in join_all(futures).await {
                if !result.success {
                    failed.insert(result.name.clone());
                }
                report.insert(result);
            }
        }

        report.mark_completed();
        info!(
            run_id = %run_id,
            status = %report.status,
            succeeded = report.summary.succeeded,
            failed = report.summary.failed + report.summary.dependency_failed,
            "orchestration run finished"
        );
        Ok(report)
    }

    /// Drive one task through validate → execute with retry/backoff, each
    /// attempt wrapped by the timeout manager and the task's compartment.
    async fn run_task(
        &self,
        name: String,
        registered: &RegisteredTask,
        params: TaskParams,
        semaphore: &Semaphore,
    ) -> TaskResult {
        let category = registered.task.category().to_string();
        let mut result = TaskResult::new(name.clone(), category.clone());
        let mut state = TaskState::Created;
        let run_start = Instant::now();

        let _permit = match semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                result.mark_failed(
                    TaskFailure::new(FailureKind::Execution, "scheduler shut down"),
                    run_start.elapsed(),
                );
                return result;
            }
        };

        state.advance(TaskState::Validating);
        debug!(task = %name, "validating");
        match registered.task.validate(&self.context, &params).await {
            Ok(true) => {}
            Ok(false) => {
                state.advance(TaskState::Failed);
                warn!(task = %name, "validation rejected");
                let failure = TaskFailure::new(FailureKind::Validation, "precondition rejected");
                self.notify_failure(&name, &failure);
                result.mark_failed(failure, run_start.elapsed());
                self.record_outcome(&result).await;
                return result;
            }
            Err(e) => {
                state.advance(TaskState::Failed);
                warn!(task = %name, error = %e, "validation errored");
                let failure = TaskFailure::new(FailureKind::Validation, e.to_string());
                self.notify_failure(&name, &failure);
                result.mark_failed(failure, run_start.elapsed());
                self.record_outcome(&result).await;
                return result;
            }
        }

        let max_retries = registered.config.retry.max_retries;
        let mut attempt: u32 = 0;

        loop {
            state.advance(TaskState::Executing);
            attempt += 1;
            debug!(task = %name, attempt, max_attempts = max_retries + 1, "executing");

            let attempt_start = Instant::now();
            let outcome = self.attempt(&name, registered, &params).await;
            let attempt_duration = attempt_start.elapsed();

            if let Some(sla) = &self.sla {
                sla.record_operation(&category, outcome.is_ok(), attempt_duration)
                    .await;
            }

            match outcome {
                Ok(output) => {
                    state.advance(TaskState::Completed);
                    result.retries_used = attempt - 1;
                    result.metadata.extend(output.metadata);
                    result.mark_completed(output.payload, run_start.elapsed());
                    info!(task = %name, retries = result.retries_used, "task completed");
                    break;
                }
                Err(failure) if attempt <= max_retries && failure.is_retryable() => {
                    state.advance(TaskState::Retrying);
                    let delay = registered.config.retry.delay_for(attempt);
                    warn!(
                        task = %name,
                        attempt,
                        error = %failure,
                        delay_ms = delay.as_millis() as u64,
                        "attempt failed, retrying"
                    );
                    sleep(delay).await;
                }
                Err(failure) => {
                    state.advance(TaskState::Failed);
                    result.retries_used = attempt - 1;
                    error!(task = %name, attempts = attempt, error = %failure, "task failed");
                    self.notify_failure(&name, &failure);
                    result.mark_failed(failure, run_start.elapsed());
                    break;
                }
            }
        }

        self.record_outcome(&result).await;
        result
    }

    /// One execution attempt: compartment admission, then the adaptive
    /// deadline, then the task body. Every failure mode collapses into a
    /// classified [`TaskFailure`] so retry composition stays uniform.
    async fn attempt(
        &self,
        name: &str,
        registered: &RegisteredTask,
        params: &TaskParams,
    ) -> std::result::Result<TaskOutput, TaskFailure> {
        let task = Arc::clone(&registered.task);
        let context = self.context.clone();
        let timeouts = Arc::clone(&self.timeouts);

        let guarded = async move {
            match timeouts
                .execute_with_timeout(name, task.execute(&context, params))
                .await
            {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(task_error)) => Err(TaskFailure::from(task_error)),
                Err(ResilienceError::Timeout { timeout, .. }) => Err(TaskFailure::new(
                    FailureKind::Timeout,
                    format!("attempt exceeded deadline of {timeout:?}"),
                )),
                Err(other) => Err(TaskFailure::new(FailureKind::Execution, other.to_string())),
            }
        };

        match (&self.bulkhead, &registered.compartment) {
            (Some(bulkhead), Some(compartment)) => {
                match bulkhead.execute(compartment, || guarded).await {
                    Ok(output) => Ok(output),
                    Err(BulkheadError::Rejected(e)) => Err(TaskFailure::new(
                        FailureKind::CompartmentUnavailable,
                        e.to_string(),
                    )),
                    Err(BulkheadError::Operation(failure)) => Err(failure),
                }
            }
            _ => guarded.await,
        }
    }

    fn notify_failure(&self, name: &str, failure: &TaskFailure) {
        if let Some(handler) = &self.error_handler {
            handler(name, failure);
        }
    }

    /// Publish the terminal outcome into the shared context for downstream
    /// tasks and external collaborators.
    async fn record_outcome(&self, result: &TaskResult) {
        let written = if result.success {
            self.context
                .set(
                    format!("{}.result", result.name),
                    result.payload.clone().unwrap_or(Value::Null),
                    &result.name,
                )
                .await
        } else if let Some(failure) = &result.error {
            self.context
                .set(format!("{}.error", result.name), failure, &result.name)
                .await
        } else {
            Ok(())
        };

        if let Err(e) = written {
            warn!(task = %result.name, error = %e, "failed to publish task outcome");
        }
    }
}
