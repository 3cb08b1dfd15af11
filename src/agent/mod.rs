//! Agent runtime
//!
//! Workers are independent pipeline stages registered by name. They receive
//! typed [`Task`]s through FIFO inboxes, and every execution yields a
//! [`TaskResult`] that is appended to the [`TaskHistory`].

mod history;
mod runtime;
mod task;
mod worker;

pub use history::{HistoryEntry, TaskHistory};
pub use runtime::AgentRuntime;
pub use task::{
    AnalyzeRequest, ContentRequest, CrawlRequest, GenerateRequest, LoginRequest, Task, TaskKind,
    TaskOutcome, TaskOutput, TaskPriority, TaskResult,
};
pub use worker::{AgentHandle, Worker, WorkerContext};

use thiserror::Error;

/// Errors raised by the runtime itself, never by a task
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent {0} is not active")]
    NotActive(String),

    #[error("No agent named {0} is registered")]
    UnknownAgent(String),

    #[error("Agent {agent} failed to initialize: {message}")]
    Initialization { agent: String, message: String },

    #[error("Agent {0} has no queued task")]
    EmptyQueue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Logs in on every task and, when asked, routes a crawl to `next`
    struct EchoWorker {
        name: String,
        next: Option<String>,
        fail: bool,
        panic: bool,
        cleaned: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }

    impl EchoWorker {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                next: None,
                fail: false,
                panic: false,
                cleaned: Default::default(),
            }
        }
    }

    #[async_trait]
    impl Worker for EchoWorker {
        fn name(&self) -> &str {
            &self.name
        }

        async fn process_task(
            &mut self,
            task: &Task,
            ctx: &mut WorkerContext,
        ) -> crate::Result<TaskOutput> {
            if self.panic {
                panic!("selector table is empty");
            }
            if self.fail {
                return Err(crate::ManualError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk on fire",
                )));
            }
            if let Some(next) = &self.next {
                ctx.route(
                    next,
                    TaskKind::Crawl(CrawlRequest {
                        start_url: "https://example.test/".to_string(),
                    }),
                );
            }
            Ok(TaskOutput::LoggedIn {
                landing_url: format!("{}:{}", self.name, task.kind.name()),
            })
        }

        async fn cleanup(&mut self) -> crate::Result<()> {
            self.cleaned.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    fn crawl_task() -> Task {
        Task::new(
            TaskKind::Crawl(CrawlRequest {
                start_url: "https://example.test/".to_string(),
            }),
            "test",
        )
    }

    #[tokio::test]
    async fn test_dispatch_executes_and_records() {
        let mut runtime = AgentRuntime::new();
        runtime.register(Box::new(EchoWorker::new("echo")));
        runtime.initialize_all().await.unwrap();

        let task = crawl_task();
        let task_id = task.id;
        let result = runtime.dispatch("echo", task).await.unwrap();

        assert!(result.success);
        assert_eq!(result.task_id, task_id);
        assert!(result.report.contains("## echo: crawl"));
        assert!(result.report.contains("completed"));
        assert_eq!(runtime.history().len(), 1);
        assert!(runtime.history().find(task_id).unwrap().success);
    }

    #[tokio::test]
    async fn test_inactive_agent_rejects_tasks() {
        let mut runtime = AgentRuntime::new();
        runtime.register(Box::new(EchoWorker::new("echo")));

        let result = runtime.dispatch("echo", crawl_task()).await;
        assert!(matches!(result, Err(AgentError::NotActive(name)) if name == "echo"));
        assert!(runtime.history().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_agent() {
        let mut runtime = AgentRuntime::new();
        let result = runtime.route_task("nobody", crawl_task());
        assert!(matches!(result, Err(AgentError::UnknownAgent(_))));
    }

    #[tokio::test]
    async fn test_worker_error_becomes_failed_result() {
        let mut runtime = AgentRuntime::new();
        let mut worker = EchoWorker::new("broken");
        worker.fail = true;
        runtime.register(Box::new(worker));
        runtime.initialize_all().await.unwrap();

        let result = runtime.dispatch("broken", crawl_task()).await.unwrap();
        assert!(!result.success);
        assert!(result.error().unwrap().contains("disk on fire"));
        assert!(result.report.contains("- Error:"));
        assert_eq!(runtime.history().failures().count(), 1);
    }

    #[tokio::test]
    async fn test_worker_panic_becomes_failed_result() {
        let mut runtime = AgentRuntime::new();
        let mut worker = EchoWorker::new("panicky");
        worker.panic = true;
        runtime.register(Box::new(worker));
        runtime.initialize_all().await.unwrap();

        let result = runtime.dispatch("panicky", crawl_task()).await.unwrap();
        assert!(!result.success);
        assert!(result.error().unwrap().contains("selector table is empty"));
        assert!(result.report.contains("- Error: worker panicked"));
        assert_eq!(runtime.history().failures().count(), 1);
        assert!(runtime.is_active("panicky"));
    }

    #[tokio::test]
    async fn test_routed_tasks_reach_target_inbox() {
        let mut runtime = AgentRuntime::new();
        let mut first = EchoWorker::new("first");
        first.next = Some("second".to_string());
        runtime.register(Box::new(first));
        runtime.register(Box::new(EchoWorker::new("second")));
        runtime.initialize_all().await.unwrap();

        runtime.dispatch("first", crawl_task()).await.unwrap();
        assert_eq!(runtime.pending("second"), 1);

        let results = runtime.run_pending("second").await.unwrap();
        assert_eq!(results.len(), 1);
        let entry = runtime.history().for_agent("second").next().unwrap();
        assert_eq!(entry.sender, "first");
    }

    #[tokio::test]
    async fn test_run_next_on_empty_inbox() {
        let mut runtime = AgentRuntime::new();
        runtime.register(Box::new(EchoWorker::new("echo")));
        runtime.initialize_all().await.unwrap();

        let result = runtime.run_next("echo").await;
        assert!(matches!(result, Err(AgentError::EmptyQueue(_))));
    }

    #[tokio::test]
    async fn test_cleanup_deactivates_agents() {
        let mut runtime = AgentRuntime::new();
        let worker = EchoWorker::new("echo");
        let cleaned = worker.cleaned.clone();
        runtime.register(Box::new(worker));
        runtime.initialize_all().await.unwrap();
        assert!(runtime.is_active("echo"));

        runtime.cleanup_all().await;
        assert!(!runtime.is_active("echo"));
        assert!(cleaned.load(std::sync::atomic::Ordering::SeqCst));
    }
}
