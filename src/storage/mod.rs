//! Storage module for persisting run data
//!
//! This module handles everything written outside the output documents:
//! - The SQLite run ledger (executions, crawled pages, task history)
//! - Best-effort uploads to remote object storage

mod object_store;
mod schema;
mod sqlite;
mod traits;

pub use object_store::{HttpObjectStore, ObjectStore};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Opens the ledger at `path`, creating the file and its parent directory if needed
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    SqliteStorage::new(path)
}

/// Status of a pipeline execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Interrupted,
}

impl ExecutionStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Ledger row for one pipeline execution
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub start_url: String,
    pub config_hash: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub phases_completed: Vec<String>,
    pub pages_processed: u64,
    pub elements_analyzed: u64,
    pub screenshots_captured: u64,
    pub word_count: u64,
    pub error_message: Option<String>,
}

/// Ledger row for one crawled page
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPage {
    pub url: String,
    pub depth: u32,
    pub title: String,
    pub element_count: u64,
    pub screenshot_count: u64,
    pub load_time_ms: u64,
    pub captured_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_status_roundtrip() {
        for status in [
            ExecutionStatus::Running,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
            ExecutionStatus::Interrupted,
        ] {
            assert_eq!(ExecutionStatus::from_db_string(status.to_db_string()), Some(status));
        }
        assert_eq!(ExecutionStatus::from_db_string("paused"), None);
    }

    #[test]
    fn test_open_storage_creates_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/ledger.db");
        assert!(open_storage(&path).is_ok());
        assert!(path.exists());
    }
}
