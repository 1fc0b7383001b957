// ABOUTME: Composable task wrappers for cross-cutting execution behavior
// ABOUTME: Resource usage snapshots and execution tracing around task bodies

use async_trait::async_trait;
use sysinfo::System;
use tokio::sync::Mutex;
use tracing::{debug, Instrument};

use super::{Result, Task, TaskOutput, TaskParams};
use crate::context::SharedContext;

/// Wraps a task and attaches process-level CPU/memory deltas to its output.
///
/// Snapshots are taken immediately before and after `execute`; deltas land in
/// the output metadata under `resource.*` keys. Failures pass through
/// unchanged.
pub struct ResourceMonitored<T> {
    inner: T,
    system: Mutex<System>,
}

impl<T> ResourceMonitored<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            system: Mutex::new(System::new()),
        }
    }

    async fn snapshot(&self) -> Option<(f32, u64)> {
        let pid = sysinfo::get_current_pid().ok()?;
        let mut system = self.system.lock().await;
        if !system.refresh_process(pid) {
            return None;
        }
        let process = system.process(pid)?;
        Some((process.cpu_usage(), process.memory()))
    }
}

#[async_trait]
impl<T: Task> Task for ResourceMonitored<T> {
    async fn validate(&self, context: &SharedContext, params: &TaskParams) -> Result<bool> {
        self.inner.validate(context, params).await
    }

    async fn execute(&self, context: &SharedContext, params: &TaskParams) -> Result<TaskOutput> {
        let before = self.snapshot().await;
        let result = self.inner.execute(context, params).await;
        let after = self.snapshot().await;

        match result {
            Ok(mut output) => {
                if let (Some((cpu_before, mem_before)), Some((cpu_after, mem_after))) =
                    (before, after)
                {
                    output.add_metadata("resource.cpu_percent", format!("{cpu_after:.2}"));
                    output.add_metadata(
                        "resource.cpu_percent_delta",
                        format!("{:.2}", cpu_after - cpu_before),
                    );
                    output.add_metadata("resource.memory_bytes", mem_after.to_string());
                    output.add_metadata(
                        "resource.memory_delta_bytes",
                        (mem_after as i64 - mem_before as i64).to_string(),
                    );
                }
                Ok(output)
            }
            Err(e) => Err(e),
        }
    }

    fn category(&self) -> &str {
        self.inner.category()
    }
}

/// Wraps a task and records what it did to the shared context.
///
/// Captures the context version delta and the keys written during `execute`
/// into the output metadata (`trace.*` keys) and a debug span. Never alters
/// control flow or the result.
pub struct Traced<T> {
    inner: T,
}

impl<T> Traced<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: Task> Task for Traced<T> {
    async fn validate(&self, context: &SharedContext, params: &TaskParams) -> Result<bool> {
        self.inner.validate(context, params).await
    }

    async fn execute(&self, context: &SharedContext, params: &TaskParams) -> Result<TaskOutput> {
        let version_before = context.version().await;
        let span = tracing::debug_span!("task_execute", category = %self.inner.category());

        let result = self.inner.execute(context, params).instrument(span).await;

        let writes = context.history_since(version_before).await;
        let keys_written: Vec<&str> = writes.iter().map(|entry| entry.key.as_str()).collect();
        debug!(
            context_writes = writes.len(),
            keys = ?keys_written,
            "task execution traced"
        );

        match result {
            Ok(mut output) => {
                output.add_metadata("trace.context_writes", writes.len().to_string());
                output.add_metadata("trace.keys_written", keys_written.join(","));
                output.add_metadata(
                    "trace.params",
                    params.keys().cloned().collect::<Vec<_>>().join(","),
                );
                Ok(output)
            }
            Err(e) => Err(e),
        }
    }

    fn category(&self) -> &str {
        self.inner.category()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskError;
    use serde_json::json;

    struct WritingTask;

    #[async_trait]
    impl Task for WritingTask {
        async fn execute(
            &self,
            context: &SharedContext,
            _params: &TaskParams,
        ) -> Result<TaskOutput> {
            context
                .set("writer.out", json!(1), "writer")
                .await
                .map_err(TaskError::from)?;
            Ok(TaskOutput::with_payload(json!("done")))
        }

        fn category(&self) -> &str {
            "io"
        }
    }

    #[tokio::test]
    async fn test_traced_attaches_context_delta() {
        let context = SharedContext::new();
        let task = Traced::new(WritingTask);

        let output = task.execute(&context, &TaskParams::new()).await.unwrap();

        assert_eq!(output.metadata.get("trace.context_writes").unwrap(), "1");
        assert_eq!(output.metadata.get("trace.keys_written").unwrap(), "writer.out");
        assert_eq!(output.payload, Some(json!("done")));
        assert_eq!(task.category(), "io");
    }

    #[tokio::test]
    async fn test_resource_monitored_attaches_usage() {
        let context = SharedContext::new();
        let task = ResourceMonitored::new(WritingTask);

        let output = task.execute(&context, &TaskParams::new()).await.unwrap();

        // Snapshots are best-effort; when the platform supports them the
        // metadata keys must be present and well-formed.
        if let Some(memory) = output.metadata.get("resource.memory_bytes") {
            assert!(memory.parse::<u64>().is_ok());
            assert!(output.metadata.contains_key("resource.memory_delta_bytes"));
        }
        assert_eq!(output.payload, Some(json!("done")));
    }

    #[tokio::test]
    async fn test_wrappers_compose() {
        let context = SharedContext::new();
        let task = ResourceMonitored::new(Traced::new(WritingTask));

        let output = task.execute(&context, &TaskParams::new()).await.unwrap();

        assert!(output.metadata.contains_key("trace.context_writes"));
        assert_eq!(task.category(), "io");
    }
}
