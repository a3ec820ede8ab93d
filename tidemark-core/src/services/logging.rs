//! Logging service - structured event logging to DuckDB
//!
//! Stores run events in `logs.duckdb` inside the project state directory.
//! Only identifiers, timings and error text are logged - never SQL content.
//!
//! The service is an [`EventSink`], so the runner can write to it directly.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::Utc;
use duckdb::Connection;
use serde::{Deserialize, Serialize};

use crate::domain::LogEvent;
use crate::ports::EventSink;

/// File name of the log database
pub const LOG_DB_FILE: &str = "logs.duckdb";

// Ids come from a sequence stored in the log database itself, so they stay
// unique across processes sharing the file.
const LOG_SCHEMA: &str = "CREATE SEQUENCE IF NOT EXISTS sys_logs_id_seq;
CREATE TABLE IF NOT EXISTS sys_logs (
    id UBIGINT PRIMARY KEY DEFAULT nextval('sys_logs_id_seq'),
    timestamp BIGINT NOT NULL,
    entry_point VARCHAR NOT NULL,
    app_version VARCHAR NOT NULL,
    platform VARCHAR NOT NULL,
    event VARCHAR NOT NULL,
    version VARCHAR,
    file_name VARCHAR,
    duration_ms UBIGINT,
    error_message VARCHAR,
    error_details VARCHAR
);";

/// Current unix timestamp in milliseconds
fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Detect the current platform
fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// Who invoked the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    /// The `tidemark` command line tool
    Cli,
    /// A service applying migrations at startup
    Embedded,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Embedded => "embedded",
        }
    }
}

/// A log entry as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub version: Option<String>,
    pub file_name: Option<String>,
    pub duration_ms: Option<u64>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

/// Service for structured event logging
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Open or create `logs.duckdb` in `state_dir`
    pub fn new(
        state_dir: &Path,
        entry_point: EntryPoint,
        app_version: impl Into<String>,
    ) -> Result<Self> {
        std::fs::create_dir_all(state_dir)?;
        let db_path = state_dir.join(LOG_DB_FILE);
        let conn = Connection::open(&db_path)?;
        conn.execute_batch(LOG_SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            entry_point,
            app_version: app_version.into(),
            platform: detect_platform(),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    /// Log an event
    ///
    /// The entry point, app version and platform are added from the service
    /// configuration.
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO sys_logs (
                timestamp, entry_point, app_version, platform,
                event, version, file_name, duration_ms, error_message, error_details
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            duckdb::params![
                now_ms(),
                self.entry_point.as_str(),
                &self.app_version,
                self.platform,
                &event.event,
                &event.version,
                &event.file_name,
                &event.duration_ms,
                &event.error_message,
                &event.error_details,
            ],
        )?;

        Ok(())
    }

    /// Log a simple event with just a name
    pub fn log_event(&self, event: &str) -> Result<()> {
        self.log(LogEvent::new(event))
    }

    /// Most recent entries, newest first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query_entries(
            r#"
            SELECT id, timestamp, entry_point, app_version, platform,
                   event, version, file_name, duration_ms, error_message, error_details
            FROM sys_logs
            ORDER BY id DESC
            LIMIT ?
            "#,
            limit,
        )
    }

    /// Most recent entries that carry an error, newest first
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query_entries(
            r#"
            SELECT id, timestamp, entry_point, app_version, platform,
                   event, version, file_name, duration_ms, error_message, error_details
            FROM sys_logs
            WHERE error_message IS NOT NULL
            ORDER BY id DESC
            LIMIT ?
            "#,
            limit,
        )
    }

    fn query_entries(&self, sql: &str, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;

        let entries = stmt
            .query_map([limit as i64], |row| {
                Ok(LogEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    entry_point: row.get(2)?,
                    app_version: row.get(3)?,
                    platform: row.get(4)?,
                    event: row.get(5)?,
                    version: row.get(6)?,
                    file_name: row.get(7)?,
                    duration_ms: row.get(8)?,
                    error_message: row.get(9)?,
                    error_details: row.get(10)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Total number of log entries
    pub fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete logs older than the given unix timestamp (ms)
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl EventSink for LoggingService {
    fn record(&self, event: LogEvent) {
        // Logging never breaks a run
        let _ = self.log(event);
    }
}
