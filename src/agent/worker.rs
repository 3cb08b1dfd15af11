use super::task::{Task, TaskKind, TaskOutcome, TaskResult};
use super::AgentError;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, error, info};

/// A pipeline stage that processes tasks addressed to it by name
#[async_trait]
pub trait Worker: Send {
    /// Registry name tasks are routed by
    fn name(&self) -> &str;

    /// Acquires whatever the worker needs before its first task
    async fn initialize(&mut self) -> crate::Result<()> {
        Ok(())
    }

    async fn process_task(
        &mut self,
        task: &Task,
        ctx: &mut WorkerContext,
    ) -> crate::Result<super::TaskOutput>;

    /// Releases resources; called once when the runtime shuts down
    async fn cleanup(&mut self) -> crate::Result<()> {
        Ok(())
    }

    /// Markdown report attached to every result this worker produces
    fn render_report(&self, task: &Task, result: &TaskResult) -> String {
        let mut report = format!("## {}: {}\n\n", self.name(), task.kind.name());
        report.push_str(&format!("- Task: `{}`\n", task.id));
        report.push_str(&format!(
            "- Status: {}\n",
            if result.success { "completed" } else { "failed" }
        ));
        report.push_str(&format!("- Processing time: {} ms\n", result.processing_time_ms));
        match &result.outcome {
            TaskOutcome::Data(output) => report.push_str(&format!("- Result: {}\n", output.summary())),
            TaskOutcome::Error(message) => report.push_str(&format!("- Error: {}\n", message)),
        }
        report
    }
}

/// Per-execution context handed to a worker
///
/// Tasks a worker routes here are delivered by the runtime once the current
/// execution has finished.
#[derive(Debug)]
pub struct WorkerContext {
    agent: String,
    outbox: Vec<(String, Task)>,
}

impl WorkerContext {
    pub fn new(agent: &str) -> Self {
        Self {
            agent: agent.to_string(),
            outbox: Vec::new(),
        }
    }

    /// Name of the worker this context belongs to
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Queues a new task for `target`, sent by this worker
    pub fn route(&mut self, target: &str, kind: TaskKind) {
        let task = Task::new(kind, &self.agent);
        debug!("{} routes {} task {} to {}", self.agent, task.kind.name(), task.id, target);
        self.outbox.push((target.to_string(), task));
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<(String, Task)> {
        std::mem::take(&mut self.outbox)
    }
}

/// A registered worker with its inbox and lifecycle state
pub struct AgentHandle {
    worker: Box<dyn Worker>,
    active: bool,
    inbox: VecDeque<Task>,
}

impl AgentHandle {
    pub fn new(worker: Box<dyn Worker>) -> Self {
        Self {
            worker,
            active: false,
            inbox: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.worker.name()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    pub fn enqueue(&mut self, task: Task) {
        self.inbox.push_back(task);
    }

    pub(crate) fn next_task(&mut self) -> Option<Task> {
        self.inbox.pop_front()
    }

    /// Initializes the worker and marks the handle active
    pub async fn initialize(&mut self) -> Result<(), AgentError> {
        self.worker
            .initialize()
            .await
            .map_err(|e| AgentError::Initialization {
                agent: self.worker.name().to_string(),
                message: e.to_string(),
            })?;
        self.active = true;
        info!("Agent {} initialized", self.name());
        Ok(())
    }

    /// Marks the handle inactive and releases the worker's resources
    pub async fn cleanup(&mut self) -> crate::Result<()> {
        self.active = false;
        self.worker.cleanup().await
    }

    /// Runs one task through the worker
    ///
    /// Worker failures become a failed [`TaskResult`]; only an inactive
    /// handle produces an `Err`.
    pub async fn execute_task(
        &mut self,
        task: Task,
        ctx: &mut WorkerContext,
    ) -> Result<TaskResult, AgentError> {
        if !self.active {
            return Err(AgentError::NotActive(self.name().to_string()));
        }

        debug!("{} processing {} task {}", self.name(), task.kind.name(), task.id);
        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.worker.process_task(&task, ctx))
            .catch_unwind()
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut result = match outcome {
            Ok(Ok(output)) => TaskResult::completed(&task, output, elapsed_ms),
            Ok(Err(e)) => {
                error!("{} failed {} task {}: {}", self.name(), task.kind.name(), task.id, e);
                TaskResult::failed(&task, e.to_string(), elapsed_ms)
            }
            Err(panic) => {
                let message = format!("worker panicked: {}", panic_message(panic.as_ref()));
                error!("{} {} on task {}", self.name(), message, task.id);
                TaskResult::failed(&task, message, elapsed_ms)
            }
        };
        result.report = self.worker.render_report(&task, &result);
        Ok(result)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
