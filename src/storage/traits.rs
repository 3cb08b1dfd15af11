//! Storage traits and error types

use crate::agent::HistoryEntry;
use crate::crawler::PageRecord;
use crate::storage::{ExecutionRecord, StoredPage};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("Invalid timestamp in ledger: {0}")]
    InvalidTimestamp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Run ledger backend
///
/// Records every pipeline execution with the pages it crawled and the agent
/// tasks it ran.
pub trait Storage {
    // ===== Executions =====

    /// Inserts a new execution or replaces the stored row for the same id
    fn save_execution(&mut self, record: &ExecutionRecord) -> StorageResult<()>;

    fn get_execution(&self, execution_id: &str) -> StorageResult<ExecutionRecord>;

    /// Most recent executions first
    fn latest_executions(&self, limit: usize) -> StorageResult<Vec<ExecutionRecord>>;

    // ===== Pages =====

    /// Stores a summary row per page
    ///
    /// # Returns
    ///
    /// The number of rows written; pages already stored for the execution are skipped
    fn record_pages(&mut self, execution_id: &str, pages: &[PageRecord]) -> StorageResult<usize>;

    fn get_pages(&self, execution_id: &str) -> StorageResult<Vec<StoredPage>>;

    fn count_pages(&self, execution_id: &str) -> StorageResult<u64>;

    // ===== Task history =====

    fn record_task_history(
        &mut self,
        execution_id: &str,
        entries: &[HistoryEntry],
    ) -> StorageResult<usize>;

    fn count_tasks(&self, execution_id: &str) -> StorageResult<u64>;

    fn count_failed_tasks(&self, execution_id: &str) -> StorageResult<u64>;
}
