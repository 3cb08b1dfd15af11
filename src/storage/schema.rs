//! Database schema definitions
//!
//! This module contains the SQL schema of the run ledger.

/// SQL schema for the ledger
pub const SCHEMA_SQL: &str = r#"
-- One row per pipeline execution
CREATE TABLE IF NOT EXISTS executions (
    id TEXT PRIMARY KEY,
    start_url TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    phases_completed TEXT NOT NULL DEFAULT '',
    pages_processed INTEGER NOT NULL DEFAULT 0,
    elements_analyzed INTEGER NOT NULL DEFAULT 0,
    screenshots_captured INTEGER NOT NULL DEFAULT 0,
    word_count INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_executions_started ON executions(started_at);

-- Pages crawled by an execution
CREATE TABLE IF NOT EXISTS crawled_pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    execution_id TEXT NOT NULL REFERENCES executions(id),
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    title TEXT NOT NULL,
    element_count INTEGER NOT NULL,
    screenshot_count INTEGER NOT NULL,
    load_time_ms INTEGER NOT NULL,
    captured_at TEXT NOT NULL,
    UNIQUE(execution_id, url)
);

CREATE INDEX IF NOT EXISTS idx_crawled_pages_execution ON crawled_pages(execution_id);

-- Audit trail of agent tasks
CREATE TABLE IF NOT EXISTS task_history (
    task_id TEXT PRIMARY KEY,
    execution_id TEXT NOT NULL REFERENCES executions(id),
    result_id TEXT NOT NULL,
    agent TEXT NOT NULL,
    kind TEXT NOT NULL,
    sender TEXT NOT NULL,
    success INTEGER NOT NULL,
    error_message TEXT,
    processing_time_ms INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    finished_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_history_execution ON task_history(execution_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["executions", "crawled_pages", "task_history"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
