use super::task::{Task, TaskResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Audit record of one finished task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub task_id: Uuid,
    pub result_id: Uuid,
    pub agent: String,
    pub kind: String,
    pub sender: String,
    pub success: bool,
    pub error: Option<String>,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Append-only log of every completed or failed task
#[derive(Debug, Default)]
pub struct TaskHistory {
    entries: Vec<HistoryEntry>,
}

impl TaskHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, agent: &str, task: &Task, result: &TaskResult) {
        self.entries.push(HistoryEntry {
            task_id: task.id,
            result_id: result.id,
            agent: agent.to_string(),
            kind: task.kind.name().to_string(),
            sender: task.sender.clone(),
            success: result.success,
            error: result.error().map(str::to_string),
            processing_time_ms: result.processing_time_ms,
            created_at: task.created_at,
            finished_at: result.timestamp,
        });
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn for_agent<'a>(&'a self, agent: &'a str) -> impl Iterator<Item = &'a HistoryEntry> {
        self.entries.iter().filter(move |e| e.agent == agent)
    }

    pub fn failures(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().filter(|e| !e.success)
    }

    pub fn find(&self, task_id: Uuid) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.task_id == task_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
