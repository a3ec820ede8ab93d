//! DuckDB database implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, Connection};

use crate::domain::MigrationHistoryRecord;
use crate::ports::{Database, HistoryRow};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// DuckDB-backed [`Database`]
pub struct DuckDbDatabase {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbDatabase {
    /// Open (or create) a database file
    ///
    /// Retries with exponential backoff on file locking errors, which show up
    /// when another process is closing the same file.
    pub fn open(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[tidemark] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e)
                        .with_context(|| format!("Failed to open database {}", db_path.display()));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading off: cached extensions may fail code signing on macOS
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run `f` against the raw connection
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> duckdb::Result<T>,
    ) -> Result<T> {
        let conn = self.lock()?;
        Ok(f(&conn)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }
}

impl Database for DuckDbDatabase {
    fn history_table_exists(&self) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'migration_history'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn load_history(&self) -> Result<Vec<HistoryRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT migration_version, file_name, checksum, applied_at::VARCHAR, execution_time_ms
             FROM migration_history
             ORDER BY migration_version",
        )?;

        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(version, file_name, checksum, applied_at, execution_time_ms)| {
                Ok(HistoryRow {
                    applied_at: parse_timestamp(&applied_at)
                        .with_context(|| format!("bad applied_at for version {}", version))?,
                    version,
                    file_name,
                    checksum,
                    execution_time_ms,
                })
            })
            .collect()
    }

    fn insert_history(&self, record: &MigrationHistoryRecord) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO migration_history
                (migration_version, file_name, checksum, applied_at, execution_time_ms)
             VALUES (?, ?, ?, CAST(? AS TIMESTAMP), ?)",
            params![
                record.version.as_str(),
                &record.file_name,
                &record.checksum,
                format_timestamp(&record.applied_at),
                record.execution_time_ms as i64,
            ],
        )?;
        Ok(())
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    fn begin(&self) -> Result<()> {
        self.execute_batch("BEGIN TRANSACTION")
            .context("BEGIN failed")
    }

    fn commit(&self) -> Result<()> {
        self.execute_batch("COMMIT").context("COMMIT failed")
    }

    fn rollback(&self) -> Result<()> {
        self.execute_batch("ROLLBACK").context("ROLLBACK failed")
    }
}

// Helper functions

/// Timestamps are stored as naive UTC with microsecond precision
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| anyhow!("unrecognized timestamp '{}': {}", s, e))
}
