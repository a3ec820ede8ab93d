//! Core domain types
//!
//! Migrations, history records, run reports and the error taxonomy. These are
//! plain data structures - no database or filesystem access happens here.

mod event;
mod migration;
mod report;
pub mod result;

pub use event::LogEvent;
pub use migration::{
    InvalidVersion, MigrationFile, MigrationHistoryRecord, MigrationStatus, StatusReport, Version,
};
pub use report::{
    AppliedMigration, DryRunReport, PendingMigration, RunOutcome, RunReport, RunState,
};
pub use result::{
    ChecksumMismatch, ChecksumMismatchError, ExecutionError, HistoryReadError, HistoryWriteError,
    MigrationError, Result, ScanError,
};
