//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::agent::HistoryEntry;
use crate::crawler::PageRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ExecutionRecord, ExecutionStatus, StoredPage};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const EXECUTION_COLUMNS: &str = "id, start_url, config_hash, status, started_at, ended_at,
     phases_completed, pages_processed, elements_analyzed, screenshots_captured, word_count,
     error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the ledger at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn parse_time(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp(value.to_string()))
}

/// Raw execution row; timestamps are parsed after the query
struct ExecutionRow {
    id: String,
    start_url: String,
    config_hash: String,
    status: String,
    started_at: String,
    ended_at: Option<String>,
    phases_completed: String,
    pages_processed: i64,
    elements_analyzed: i64,
    screenshots_captured: i64,
    word_count: i64,
    error_message: Option<String>,
}

impl ExecutionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            start_url: row.get(1)?,
            config_hash: row.get(2)?,
            status: row.get(3)?,
            started_at: row.get(4)?,
            ended_at: row.get(5)?,
            phases_completed: row.get(6)?,
            pages_processed: row.get(7)?,
            elements_analyzed: row.get(8)?,
            screenshots_captured: row.get(9)?,
            word_count: row.get(10)?,
            error_message: row.get(11)?,
        })
    }

    fn into_record(self) -> StorageResult<ExecutionRecord> {
        Ok(ExecutionRecord {
            status: ExecutionStatus::from_db_string(&self.status).unwrap_or(ExecutionStatus::Failed),
            started_at: parse_time(&self.started_at)?,
            ended_at: self.ended_at.as_deref().map(parse_time).transpose()?,
            phases_completed: self
                .phases_completed
                .split(',')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
            execution_id: self.id,
            start_url: self.start_url,
            config_hash: self.config_hash,
            pages_processed: self.pages_processed as u64,
            elements_analyzed: self.elements_analyzed as u64,
            screenshots_captured: self.screenshots_captured as u64,
            word_count: self.word_count as u64,
            error_message: self.error_message,
        })
    }
}

impl Storage for SqliteStorage {
    // ===== Executions =====

    fn save_execution(&mut self, record: &ExecutionRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO executions (id, start_url, config_hash, status, started_at, ended_at,
                 phases_completed, pages_processed, elements_analyzed, screenshots_captured,
                 word_count, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 ended_at = excluded.ended_at,
                 phases_completed = excluded.phases_completed,
                 pages_processed = excluded.pages_processed,
                 elements_analyzed = excluded.elements_analyzed,
                 screenshots_captured = excluded.screenshots_captured,
                 word_count = excluded.word_count,
                 error_message = excluded.error_message",
            params![
                record.execution_id,
                record.start_url,
                record.config_hash,
                record.status.to_db_string(),
                record.started_at.to_rfc3339(),
                record.ended_at.map(|t| t.to_rfc3339()),
                record.phases_completed.join(","),
                record.pages_processed as i64,
                record.elements_analyzed as i64,
                record.screenshots_captured as i64,
                record.word_count as i64,
                record.error_message,
            ],
        )?;
        Ok(())
    }

    fn get_execution(&self, execution_id: &str) -> StorageResult<ExecutionRecord> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM executions WHERE id = ?1", EXECUTION_COLUMNS),
                params![execution_id],
                ExecutionRow::from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::ExecutionNotFound(execution_id.to_string()))?;

        row.into_record()
    }

    fn latest_executions(&self, limit: usize) -> StorageResult<Vec<ExecutionRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM executions ORDER BY started_at DESC, rowid DESC LIMIT ?1",
            EXECUTION_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![limit as i64], ExecutionRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(ExecutionRow::into_record).collect()
    }

    // ===== Pages =====

    fn record_pages(&mut self, execution_id: &str, pages: &[PageRecord]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO crawled_pages (execution_id, url, depth, title,
                     element_count, screenshot_count, load_time_ms, captured_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for page in pages {
                written += stmt.execute(params![
                    execution_id,
                    page.url,
                    page.depth,
                    page.title,
                    page.elements.len() as i64,
                    page.screenshots.len() as i64,
                    page.load_time_ms as i64,
                    page.captured_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn get_pages(&self, execution_id: &str) -> StorageResult<Vec<StoredPage>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, depth, title, element_count, screenshot_count, load_time_ms, captured_at
             FROM crawled_pages WHERE execution_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![execution_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(url, depth, title, elements, screenshots, load_time, captured_at)| {
                Ok(StoredPage {
                    url,
                    depth,
                    title,
                    element_count: elements as u64,
                    screenshot_count: screenshots as u64,
                    load_time_ms: load_time as u64,
                    captured_at: parse_time(&captured_at)?,
                })
            })
            .collect()
    }

    fn count_pages(&self, execution_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM crawled_pages WHERE execution_id = ?1",
            params![execution_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Task history =====

    fn record_task_history(
        &mut self,
        execution_id: &str,
        entries: &[HistoryEntry],
    ) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO task_history (task_id, execution_id, result_id, agent, kind,
                     sender, success, error_message, processing_time_ms, created_at, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for entry in entries {
                written += stmt.execute(params![
                    entry.task_id.to_string(),
                    execution_id,
                    entry.result_id.to_string(),
                    entry.agent,
                    entry.kind,
                    entry.sender,
                    entry.success,
                    entry.error,
                    entry.processing_time_ms as i64,
                    entry.created_at.to_rfc3339(),
                    entry.finished_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn count_tasks(&self, execution_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM task_history WHERE execution_id = ?1",
            params![execution_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_failed_tasks(&self, execution_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM task_history WHERE execution_id = ?1 AND success = 0",
            params![execution_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{CrawlRequest, Task, TaskHistory, TaskKind, TaskOutput, TaskResult};
    use chrono::Duration;

    fn execution(id: &str, started_at: DateTime<Utc>) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: id.to_string(),
            start_url: "https://example.test/".to_string(),
            config_hash: "abc123".to_string(),
            status: ExecutionStatus::Running,
            started_at,
            ended_at: None,
            phases_completed: Vec::new(),
            pages_processed: 0,
            elements_analyzed: 0,
            screenshots_captured: 0,
            word_count: 0,
            error_message: None,
        }
    }

    fn page(url: &str) -> PageRecord {
        PageRecord {
            url: url.to_string(),
            depth: 1,
            title: "Page".to_string(),
            elements: Vec::new(),
            navigation: Vec::new(),
            modals: Vec::new(),
            screenshots: Vec::new(),
            load_time_ms: 120,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_and_update_execution() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let started = Utc::now();
        let mut record = execution("exec-1", started);
        storage.save_execution(&record).unwrap();

        record.status = ExecutionStatus::Completed;
        record.ended_at = Some(started + Duration::seconds(5));
        record.phases_completed = vec!["crawl".to_string(), "analyze".to_string()];
        record.pages_processed = 4;
        storage.save_execution(&record).unwrap();

        let loaded = storage.get_execution("exec-1").unwrap();
        assert_eq!(loaded.status, ExecutionStatus::Completed);
        assert_eq!(loaded.phases_completed, vec!["crawl", "analyze"]);
        assert_eq!(loaded.pages_processed, 4);
        assert!(loaded.ended_at.is_some());
    }

    #[test]
    fn test_missing_execution() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_execution("nope"),
            Err(StorageError::ExecutionNotFound(_))
        ));
    }

    #[test]
    fn test_latest_executions_newest_first() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let now = Utc::now();
        storage.save_execution(&execution("old", now - Duration::hours(1))).unwrap();
        storage.save_execution(&execution("new", now)).unwrap();

        let latest = storage.latest_executions(1).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].execution_id, "new");
    }

    #[test]
    fn test_record_pages_skips_duplicates() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.save_execution(&execution("exec-1", Utc::now())).unwrap();

        let pages = vec![page("https://example.test/"), page("https://example.test/a")];
        assert_eq!(storage.record_pages("exec-1", &pages).unwrap(), 2);
        assert_eq!(storage.record_pages("exec-1", &pages[..1]).unwrap(), 0);
        assert_eq!(storage.count_pages("exec-1").unwrap(), 2);

        let stored = storage.get_pages("exec-1").unwrap();
        assert_eq!(stored[1].url, "https://example.test/a");
        assert_eq!(stored[1].load_time_ms, 120);
    }

    #[test]
    fn test_pages_require_execution() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.record_pages("ghost", &[page("https://example.test/")]).is_err());
    }

    #[test]
    fn test_task_history() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.save_execution(&execution("exec-1", Utc::now())).unwrap();

        let mut history = TaskHistory::new();
        for success in [true, false] {
            let task = Task::new(
                TaskKind::Crawl(CrawlRequest {
                    start_url: "https://example.test/".to_string(),
                }),
                "pipeline",
            );
            let result = if success {
                TaskResult::completed(
                    &task,
                    TaskOutput::LoggedIn {
                        landing_url: "https://example.test/".to_string(),
                    },
                    5,
                )
            } else {
                TaskResult::failed(&task, "navigation failed", 5)
            };
            history.record("crawl", &task, &result);
        }

        assert_eq!(storage.record_task_history("exec-1", history.entries()).unwrap(), 2);
        assert_eq!(storage.count_tasks("exec-1").unwrap(), 2);
        assert_eq!(storage.count_failed_tasks("exec-1").unwrap(), 1);
    }
}
