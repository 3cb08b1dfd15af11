use super::history::TaskHistory;
use super::task::{Task, TaskResult};
use super::worker::{AgentHandle, Worker, WorkerContext};
use super::AgentError;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Registry of workers addressed by name
///
/// Tasks are delivered through per-worker FIFO inboxes; workers never call
/// each other directly.
#[derive(Default)]
pub struct AgentRuntime {
    agents: HashMap<String, AgentHandle>,
    /// Registration order, used for initialization and cleanup
    order: Vec<String>,
    history: TaskHistory,
}

impl AgentRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a worker, replacing any previously registered under the same name
    pub fn register(&mut self, worker: Box<dyn Worker>) {
        let name = worker.name().to_string();
        if self.agents.insert(name.clone(), AgentHandle::new(worker)).is_some() {
            warn!("Agent {} registered twice, replacing the earlier one", name);
        } else {
            self.order.push(name.clone());
        }
        debug!("Registered agent {}", name);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.agents.get(name).map_or(false, AgentHandle::is_active)
    }

    /// Agent names in registration order
    pub fn agent_names(&self) -> &[String] {
        &self.order
    }

    pub fn pending(&self, name: &str) -> usize {
        self.agents.get(name).map_or(0, AgentHandle::pending)
    }

    /// Initializes every agent in registration order, stopping at the first failure
    pub async fn initialize_all(&mut self) -> Result<(), AgentError> {
        for name in &self.order {
            if let Some(handle) = self.agents.get_mut(name) {
                handle.initialize().await?;
            }
        }
        info!("Initialized {} agents", self.order.len());
        Ok(())
    }

    /// Cleans up every active agent in reverse registration order
    ///
    /// Failures are logged; cleanup of the remaining agents continues.
    pub async fn cleanup_all(&mut self) {
        for name in self.order.iter().rev() {
            let Some(handle) = self.agents.get_mut(name) else {
                continue;
            };
            if !handle.is_active() {
                continue;
            }
            match handle.cleanup().await {
                Ok(()) => debug!("Agent {} cleaned up", name),
                Err(e) => warn!("Cleanup of agent {} failed: {}", name, e),
            }
        }
    }

    /// Queues `task` in `target`'s inbox
    pub fn route_task(&mut self, target: &str, task: Task) -> Result<(), AgentError> {
        let handle = self
            .agents
            .get_mut(target)
            .ok_or_else(|| AgentError::UnknownAgent(target.to_string()))?;
        debug!(
            "Routed {} task {} from {} to {}",
            task.kind.name(),
            task.id,
            task.sender,
            target
        );
        handle.enqueue(task);
        Ok(())
    }

    /// Routes `task` to `target`, then executes `target`'s next queued task
    pub async fn dispatch(&mut self, target: &str, task: Task) -> Result<TaskResult, AgentError> {
        self.route_task(target, task)?;
        self.run_next(target).await
    }

    /// Executes every task waiting in `target`'s inbox, in arrival order
    ///
    /// Tasks routed to `target` while it runs are executed too.
    pub async fn run_pending(&mut self, target: &str) -> Result<Vec<TaskResult>, AgentError> {
        let mut results = Vec::new();
        while self.pending(target) > 0 {
            results.push(self.run_next(target).await?);
        }
        Ok(results)
    }

    /// Executes `target`'s next queued task and delivers anything it routed
    pub async fn run_next(&mut self, target: &str) -> Result<TaskResult, AgentError> {
        let handle = self
            .agents
            .get_mut(target)
            .ok_or_else(|| AgentError::UnknownAgent(target.to_string()))?;
        let task = handle
            .next_task()
            .ok_or_else(|| AgentError::EmptyQueue(target.to_string()))?;

        let mut ctx = WorkerContext::new(target);
        let audit = task.clone();
        let result = handle.execute_task(task, &mut ctx).await?;
        self.history.record(target, &audit, &result);

        for (next, routed) in ctx.take_outbox() {
            if let Err(e) = self.route_task(&next, routed) {
                warn!("Dropping task routed by {}: {}", target, e);
            }
        }

        Ok(result)
    }

    pub fn history(&self) -> &TaskHistory {
        &self.history
    }
}
