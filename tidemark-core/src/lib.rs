//! Tidemark Core - versioned SQL migrations for DuckDB
//!
//! This crate implements the migration runner following hexagonal architecture:
//!
//! - **domain**: Core entities (MigrationFile, history records, run reports, errors)
//! - **ports**: Trait definitions for external dependencies (Database, EventSink)
//! - **services**: Scanning, checksums, batch splitting, validation, execution
//! - **adapters**: Concrete implementations (DuckDB, file lock)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::Path;

use anyhow::{Context, Result};

use adapters::duckdb::DuckDbDatabase;
use adapters::file_lock::{lock_path_for, RunLock};
use config::Config;
use ports::{EventSink, NullSink};
use services::*;

// Re-export commonly used types at crate root
pub use domain::{
    DryRunReport, LogEvent, MigrationError, MigrationFile, MigrationHistoryRecord,
    MigrationStatus, RunOutcome, RunReport, RunState, StatusReport, Version,
};
pub use services::{BootstrapResult, CancellationToken, EntryPoint, MigrationRunner};

static NULL_SINK: NullSink = NullSink;

/// Main context for Tidemark operations
///
/// Holds the configuration, the database connection and the event log for one
/// project directory.
pub struct TidemarkContext {
    pub config: Config,
    pub database: DuckDbDatabase,
    pub logger: Option<LoggingService>,
}

impl TidemarkContext {
    /// Create a new context for `project_dir`
    ///
    /// A logger that fails to open is dropped; logging never blocks a run.
    pub fn new(project_dir: &Path, entry_point: EntryPoint) -> Result<Self> {
        let config = Config::load(project_dir)?;

        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let database = DuckDbDatabase::open(&config.database_path)?;

        let logger =
            LoggingService::new(&config.state_dir(), entry_point, env!("CARGO_PKG_VERSION")).ok();

        Ok(Self {
            config,
            database,
            logger,
        })
    }

    fn sink(&self) -> &dyn EventSink {
        match &self.logger {
            Some(logger) => logger as &dyn EventSink,
            None => &NULL_SINK,
        }
    }

    fn scanner(&self) -> MigrationFileScanner {
        MigrationFileScanner::new()
            .with_bootstrap_version(self.config.bootstrap_version)
            .with_allow_version_gaps(self.config.allow_version_gaps)
    }

    fn splitter(&self) -> BatchSplitter {
        BatchSplitter::new(self.config.batch_separator.as_str())
    }

    /// Runner wired to this project's database, settings and event log
    pub fn runner(&self) -> MigrationRunner<'_> {
        MigrationRunner::new(&self.database, &self.config.migrations_dir)
            .with_scanner(self.scanner())
            .with_splitter(self.splitter())
            .with_event_sink(self.sink())
    }

    /// Apply every pending migration while holding the run lock
    pub fn migrate(&self, cancellation: &CancellationToken) -> RunReport {
        let _lock = match RunLock::acquire(&self.lock_path()) {
            Ok(lock) => lock,
            Err(error) => {
                self.sink().record(
                    LogEvent::new("run_aborted")
                        .with_error(error.to_string())
                        .with_error_details(error.kind()),
                );
                return RunReport::aborted(error);
            }
        };

        self.runner().with_cancellation(cancellation.clone()).run()
    }

    /// Applied/pending/checksum state of every migration
    pub fn status(&self) -> domain::result::Result<StatusReport> {
        self.runner().status()
    }

    /// Scan and verify checksums; list what `migrate` would apply
    pub fn validate(&self) -> domain::result::Result<DryRunReport> {
        self.runner().dry_run()
    }

    /// Create the history table if needed, holding the run lock
    pub fn bootstrap(&self) -> domain::result::Result<BootstrapResult> {
        let _lock = RunLock::acquire(&self.lock_path())?;
        BootstrapService::new(&self.database, &self.config.migrations_dir)
            .with_scanner(self.scanner())
            .with_splitter(self.splitter())
            .with_event_sink(self.sink())
            .run()
    }

    fn lock_path(&self) -> std::path::PathBuf {
        lock_path_for(&self.config.database_path)
    }
}
