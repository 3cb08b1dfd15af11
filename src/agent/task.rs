//! Task envelope and the typed payloads exchanged between workers

use crate::analysis::CrawlAnalysis;
use crate::config::{AuthConfig, OutputFormat};
use crate::content::{GeneratedDocuments, ManualContent};
use crate::crawler::CrawlOutput;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Scheduling hint carried with a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Log in to the application under documentation
#[derive(Clone)]
pub struct LoginRequest {
    pub auth: AuthConfig,
    /// Used when the auth section has no login URL of its own
    pub start_url: String,
}

impl LoginRequest {
    pub fn login_url(&self) -> &str {
        self.auth.login_url.as_deref().unwrap_or(&self.start_url)
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("login_url", &self.login_url())
            .field("username", &self.auth.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub start_url: String,
}

#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub crawl: Arc<CrawlOutput>,
}

#[derive(Debug, Clone)]
pub struct ContentRequest {
    pub crawl: Arc<CrawlOutput>,
    pub analysis: Arc<CrawlAnalysis>,
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub content: Arc<ManualContent>,
    pub format: OutputFormat,
}

/// What a task asks its worker to do
#[derive(Debug, Clone)]
pub enum TaskKind {
    Login(LoginRequest),
    Crawl(CrawlRequest),
    Analyze(AnalyzeRequest),
    Content(ContentRequest),
    Generate(GenerateRequest),
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login(_) => "login",
            Self::Crawl(_) => "crawl",
            Self::Analyze(_) => "analyze",
            Self::Content(_) => "content",
            Self::Generate(_) => "generate",
        }
    }
}

/// A unit of work addressed to one worker
///
/// Tasks are immutable once built and are consumed by exactly one execution.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub kind: TaskKind,
    /// Name of the worker or component that created the task
    pub sender: String,
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(kind: TaskKind, sender: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            sender: sender.to_string(),
            priority: TaskPriority::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Data produced by a successful task
#[derive(Debug, Clone)]
pub enum TaskOutput {
    LoggedIn { landing_url: String },
    Crawled(Arc<CrawlOutput>),
    Analyzed(Arc<CrawlAnalysis>),
    Content(Arc<ManualContent>),
    Generated(GeneratedDocuments),
}

impl TaskOutput {
    /// One-line description for reports and logs
    pub fn summary(&self) -> String {
        match self {
            Self::LoggedIn { landing_url } => format!("logged in, landed on {}", landing_url),
            Self::Crawled(crawl) => format!(
                "{} pages crawled, {} failed, {} elements, {} screenshots",
                crawl.pages.len(),
                crawl.failed.len(),
                crawl.element_count(),
                crawl.screenshot_count()
            ),
            Self::Analyzed(analysis) => format!(
                "{} pages analyzed, average accessibility {:.1}",
                analysis.total_pages, analysis.average_accessibility
            ),
            Self::Content(content) => format!(
                "{} sections, {} words",
                content.sections.len(),
                content.word_count
            ),
            Self::Generated(documents) => format!("{} documents written", documents.paths().len()),
        }
    }
}

/// Data on success, message on failure
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Data(TaskOutput),
    Error(String),
}

/// Outcome of one task execution
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub id: Uuid,
    pub task_id: Uuid,
    pub success: bool,
    pub outcome: TaskOutcome,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
    /// Human-readable report rendered by the worker
    pub report: String,
}

impl TaskResult {
    pub fn completed(task: &Task, output: TaskOutput, processing_time_ms: u64) -> Self {
        Self::build(task, TaskOutcome::Data(output), processing_time_ms)
    }

    pub fn failed(task: &Task, error: impl Into<String>, processing_time_ms: u64) -> Self {
        Self::build(task, TaskOutcome::Error(error.into()), processing_time_ms)
    }

    fn build(task: &Task, outcome: TaskOutcome, processing_time_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: task.id,
            success: matches!(outcome, TaskOutcome::Data(_)),
            outcome,
            timestamp: Utc::now(),
            processing_time_ms,
            report: String::new(),
        }
    }

    pub fn output(&self) -> Option<&TaskOutput> {
        match &self.outcome {
            TaskOutcome::Data(output) => Some(output),
            TaskOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Data(_) => None,
            TaskOutcome::Error(message) => Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crawl_task() -> Task {
        Task::new(
            TaskKind::Crawl(CrawlRequest {
                start_url: "https://example.test/".to_string(),
            }),
            "pipeline",
        )
    }

    #[test]
    fn test_tasks_get_unique_ids() {
        let a = crawl_task();
        let b = crawl_task();
        assert_ne!(a.id, b.id);
        assert_eq!(a.priority, TaskPriority::Normal);
        assert_eq!(a.kind.name(), "crawl");
    }

    #[test]
    fn test_result_constructors() {
        let task = crawl_task();
        let ok = TaskResult::completed(
            &task,
            TaskOutput::LoggedIn {
                landing_url: "https://example.test/home".to_string(),
            },
            12,
        );
        assert!(ok.success);
        assert_eq!(ok.task_id, task.id);
        assert!(ok.output().is_some());
        assert!(ok.error().is_none());

        let failed = TaskResult::failed(&task, "boom", 3);
        assert!(!failed.success);
        assert_eq!(failed.error(), Some("boom"));
        assert_ne!(failed.id, ok.id);
    }

    #[test]
    fn test_login_request_debug_hides_password() {
        let request = LoginRequest {
            auth: AuthConfig::new("alice", "hunter2"),
            start_url: "https://example.test/login".to_string(),
        };
        let debug = format!("{:?}", request);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(request.login_url(), "https://example.test/login");
    }
}
