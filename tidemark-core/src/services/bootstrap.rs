//! Bootstrap service - creates the history table out-of-band
//!
//! The bootstrap migration (`V000__*.sql`) is never applied by the runner: it
//! creates the very table the runner depends on. It is applied once, by a
//! separate and usually more privileged invocation, before the first run.
//! When the directory has no bootstrap file the built-in DDL is used.

use std::path::PathBuf;

use serde::Serialize;

use crate::domain::{LogEvent, MigrationError, Result};
use crate::ports::{Database, EventSink, NullSink, HISTORY_TABLE};
use crate::services::executor::{with_rollback_outcome, Transaction};
use crate::services::scanner::MigrationFileScanner;
use crate::services::splitter::BatchSplitter;

/// History table DDL used when no bootstrap file is present
pub const DEFAULT_BOOTSTRAP_SQL: &str = "CREATE TABLE IF NOT EXISTS migration_history (
    migration_version VARCHAR PRIMARY KEY,
    file_name VARCHAR NOT NULL,
    checksum VARCHAR NOT NULL,
    applied_at TIMESTAMP NOT NULL,
    execution_time_ms BIGINT NOT NULL
);";

static NULL_SINK: NullSink = NullSink;

/// What the bootstrap step did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum BootstrapResult {
    /// History table already existed; nothing was executed
    AlreadyBootstrapped,
    /// Bootstrap SQL was applied; `source` is the file name or `built-in`
    Applied { source: String, batch_count: usize },
}

pub struct BootstrapService<'a> {
    db: &'a dyn Database,
    migrations_dir: PathBuf,
    scanner: MigrationFileScanner,
    splitter: BatchSplitter,
    sink: &'a dyn EventSink,
}

impl<'a> BootstrapService<'a> {
    pub fn new(db: &'a dyn Database, migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            migrations_dir: migrations_dir.into(),
            scanner: MigrationFileScanner::default(),
            splitter: BatchSplitter::default(),
            sink: &NULL_SINK,
        }
    }

    pub fn with_scanner(mut self, scanner: MigrationFileScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_splitter(mut self, splitter: BatchSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_event_sink(mut self, sink: &'a dyn EventSink) -> Self {
        self.sink = sink;
        self
    }

    /// Create the history table if it does not exist yet
    pub fn run(&self) -> Result<BootstrapResult> {
        if self.table_exists()? {
            return Ok(BootstrapResult::AlreadyBootstrapped);
        }

        let (source, sql) = if self.migrations_dir.is_dir() {
            match self.scanner.find_bootstrap(&self.migrations_dir)? {
                Some(file) => (file.file_name().to_string(), file.sql_content().to_string()),
                None => ("built-in".to_string(), DEFAULT_BOOTSTRAP_SQL.to_string()),
            }
        } else {
            ("built-in".to_string(), DEFAULT_BOOTSTRAP_SQL.to_string())
        };

        let batches = self.splitter.split(&sql);
        let tx = Transaction::begin(self.db).map_err(bootstrap_error)?;
        for batch in &batches {
            if let Err(e) = tx.execute_batch(batch) {
                let cause = with_rollback_outcome(tx, format!("{source}: {e:#}"));
                return Err(MigrationError::Bootstrap(cause));
            }
        }
        tx.commit().map_err(bootstrap_error)?;

        if !self.table_exists()? {
            return Err(MigrationError::Bootstrap(format!(
                "{source} did not create the {HISTORY_TABLE} table"
            )));
        }

        let mut event = LogEvent::new("bootstrap_applied");
        event.file_name = Some(source.clone());
        self.sink.record(event);

        Ok(BootstrapResult::Applied {
            source,
            batch_count: batches.len(),
        })
    }

    fn table_exists(&self) -> Result<bool> {
        self.db.history_table_exists().map_err(bootstrap_error)
    }
}

fn bootstrap_error(e: anyhow::Error) -> MigrationError {
    MigrationError::Bootstrap(format!("{e:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbDatabase;
    use crate::services::test_support::StuckRollback;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_bootstrap_is_idempotent() {
        let db = DuckDbDatabase::open_in_memory().unwrap();
        let dir = TempDir::new().unwrap();
        let service = BootstrapService::new(&db, dir.path());

        let first = service.run().unwrap();
        assert_eq!(
            first,
            BootstrapResult::Applied {
                source: "built-in".to_string(),
                batch_count: 1
            }
        );
        assert!(db.history_table_exists().unwrap());

        assert_eq!(service.run().unwrap(), BootstrapResult::AlreadyBootstrapped);
    }

    #[test]
    fn test_bootstrap_file_used_when_present() {
        let db = DuckDbDatabase::open_in_memory().unwrap();
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("V000__bootstrap.sql"),
            format!("{DEFAULT_BOOTSTRAP_SQL}\nGO\nCREATE TABLE app_settings (k VARCHAR);\nGO\n"),
        )
        .unwrap();

        let result = BootstrapService::new(&db, dir.path()).run().unwrap();
        assert_eq!(
            result,
            BootstrapResult::Applied {
                source: "V000__bootstrap.sql".to_string(),
                batch_count: 2
            }
        );
    }

    #[test]
    fn test_bootstrap_file_must_create_history_table() {
        let db = DuckDbDatabase::open_in_memory().unwrap();
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("V000__bootstrap.sql"), "CREATE TABLE other (x INTEGER);").unwrap();

        let err = BootstrapService::new(&db, dir.path()).run().unwrap_err();
        assert!(matches!(err, MigrationError::Bootstrap(_)));
        assert!(err.to_string().contains("did not create"));
    }

    #[test]
    fn test_failed_bootstrap_reports_rollback_failure() {
        let db = StuckRollback(DuckDbDatabase::open_in_memory().unwrap());
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("V000__bootstrap.sql"), "CREATE TABLE broken (").unwrap();

        let err = BootstrapService::new(&db, dir.path()).run().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("V000__bootstrap.sql"), "{message}");
        assert!(message.contains("rollback failed: connection lost"), "{message}");
    }
}
