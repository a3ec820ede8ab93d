//! Migration runner - orchestrates a full run
//!
//! `Idle → Scanning → Validating → (NoPending | Executing) → Completed | Aborted`
//!
//! Migrations are applied one at a time, in version order, on one connection.
//! The first failure stops the run; migrations committed earlier in the same
//! run stay committed.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::domain::{
    AppliedMigration, DryRunReport, LogEvent, MigrationError, MigrationFile, PendingMigration,
    Result, RunReport, RunState, StatusReport,
};
use crate::ports::{Database, EventSink, NullSink};
use crate::services::executor::TransactionalExecutor;
use crate::services::history::{History, HistoryStore};
use crate::services::scanner::MigrationFileScanner;
use crate::services::splitter::BatchSplitter;
use crate::services::validator;

static NULL_SINK: NullSink = NullSink;

/// Shared flag used to stop a run between migrations
///
/// A migration that has already started always runs to commit or rollback.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrates scanning, validation and execution for one database
pub struct MigrationRunner<'a> {
    db: &'a dyn Database,
    migrations_dir: PathBuf,
    scanner: MigrationFileScanner,
    executor: TransactionalExecutor,
    sink: &'a dyn EventSink,
    cancellation: CancellationToken,
    state: Cell<RunState>,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(db: &'a dyn Database, migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            migrations_dir: migrations_dir.into(),
            scanner: MigrationFileScanner::default(),
            executor: TransactionalExecutor::default(),
            sink: &NULL_SINK,
            cancellation: CancellationToken::default(),
            state: Cell::new(RunState::Idle),
        }
    }

    pub fn with_scanner(mut self, scanner: MigrationFileScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_splitter(mut self, splitter: BatchSplitter) -> Self {
        self.executor = TransactionalExecutor::new(splitter);
        self
    }

    pub fn with_event_sink(mut self, sink: &'a dyn EventSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Current (or, after a run, final) state
    pub fn state(&self) -> RunState {
        self.state.get()
    }

    /// Apply every pending migration
    ///
    /// Always returns a report; an aborted run is an outcome, not a panic.
    pub fn run(&self) -> RunReport {
        let started = Instant::now();
        self.state.set(RunState::Idle);
        self.sink.record(LogEvent::new("run_started"));

        let mut applied = Vec::new();
        let result = self.execute(&mut applied);
        let elapsed = started.elapsed();
        let report = RunReport::new(applied, elapsed, result.err());

        match &report.error {
            None => {
                self.transition(RunState::Completed);
                self.sink.record(
                    LogEvent::new("run_completed").with_duration_ms(report.total_elapsed_ms),
                );
            }
            Some(error) => {
                self.transition(RunState::Aborted);
                self.sink.record(
                    LogEvent::new("run_aborted")
                        .with_duration_ms(report.total_elapsed_ms)
                        .with_error(error.to_string())
                        .with_error_details(error.kind()),
                );
            }
        }

        report
    }

    /// Scan and validate, and list what `run` would apply, without executing
    pub fn dry_run(&self) -> Result<DryRunReport> {
        let (files, history) = self.scan()?;
        self.check_checksums(&files, &history)?;

        let pending = validator::compute_pending(&files, &history)
            .into_iter()
            .map(|file| PendingMigration {
                version: file.version().clone(),
                file_name: file.file_name().to_string(),
                checksum: file.checksum().to_string(),
                batch_count: self.executor.splitter().split(file.sql_content()).len(),
            })
            .collect();

        Ok(DryRunReport {
            applied_count: history.len(),
            pending,
        })
    }

    /// Per-file applied/pending/checksum view; never fails on mismatch
    pub fn status(&self) -> Result<StatusReport> {
        let (files, history) = self.scan()?;
        Ok(validator::build_statuses(&files, &history))
    }

    fn execute(&self, applied: &mut Vec<AppliedMigration>) -> Result<()> {
        self.transition(RunState::Scanning);
        let (files, history) = self.scan()?;

        self.transition(RunState::Validating);
        self.check_checksums(&files, &history)?;

        let pending = validator::compute_pending(&files, &history);
        if pending.is_empty() {
            self.transition(RunState::NoPending);
            return Ok(());
        }

        self.transition(RunState::Executing);
        let store = HistoryStore::new(self.db);
        for file in pending {
            if self.cancellation.is_cancelled() {
                return Err(MigrationError::Cancelled {
                    completed: applied.len(),
                });
            }

            match self.executor.apply(file, self.db, &store) {
                Ok(record) => {
                    self.sink.record(
                        LogEvent::new("migration_applied")
                            .with_migration(&record.version, &record.file_name)
                            .with_duration_ms(record.execution_time_ms),
                    );
                    applied.push(AppliedMigration::from(&record));
                }
                Err(error) => {
                    self.sink.record(
                        LogEvent::new("migration_failed")
                            .with_migration(file.version(), file.file_name())
                            .with_error(error.to_string()),
                    );
                    return Err(error);
                }
            }
        }

        Ok(())
    }

    fn scan(&self) -> Result<(Vec<MigrationFile>, History)> {
        let files = self.scanner.scan(&self.migrations_dir)?;
        let history = HistoryStore::new(self.db).load_all()?;
        Ok((files, history))
    }

    fn check_checksums(&self, files: &[MigrationFile], history: &History) -> Result<()> {
        if let Err(error) = validator::validate(files, history) {
            for mismatch in &error.mismatches {
                self.sink.record(
                    LogEvent::new("checksum_mismatch")
                        .with_migration(&mismatch.version, &mismatch.file_name)
                        .with_error("checksum mismatch")
                        .with_error_details(format!(
                            "expected {}, found {}",
                            mismatch.expected, mismatch.actual
                        )),
                );
            }
            return Err(error.into());
        }
        Ok(())
    }

    fn transition(&self, next: RunState) {
        self.state.set(next);
    }
}
