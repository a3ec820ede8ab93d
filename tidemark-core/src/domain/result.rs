//! Error types for the migration runner
//!
//! Every failure a run can end with is a variant of [`MigrationError`]. All of
//! them carry enough detail (file name, version, expected/actual values) to
//! diagnose the problem without reading logs, and all of them serialize so they
//! can be embedded in a [`RunReport`](super::RunReport).

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use super::migration::Version;

/// Top-level runner error
#[derive(Error, Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MigrationError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    ChecksumMismatch(#[from] ChecksumMismatchError),

    #[error(transparent)]
    HistoryRead(#[from] HistoryReadError),

    #[error(transparent)]
    HistoryWrite(#[from] HistoryWriteError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Run cancelled after {completed} migration(s)")]
    Cancelled { completed: usize },

    #[error("Run lock error: {0}")]
    Lock(String),

    #[error("Bootstrap error: {0}")]
    Bootstrap(String),
}

impl MigrationError {
    /// Short machine-friendly name, used as the event name suffix in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scan(_) => "scan",
            Self::ChecksumMismatch(_) => "checksum_mismatch",
            Self::HistoryRead(_) => "history_read",
            Self::HistoryWrite(_) => "history_write",
            Self::Execution(_) => "execution",
            Self::Cancelled { .. } => "cancelled",
            Self::Lock(_) => "lock",
            Self::Bootstrap(_) => "bootstrap",
        }
    }
}

/// Migration directory could not be turned into an ordered file list
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ScanError {
    #[error("Migrations directory not found: {}", .path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("Failed to read {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("Migration file {file_name} has an invalid version: {message}")]
    InvalidVersion { file_name: String, message: String },

    #[error("Duplicate migration version {version}: {first} and {second}")]
    DuplicateVersion {
        version: Version,
        first: String,
        second: String,
    },

    #[error("Missing migration version(s) between {previous} and {next}")]
    VersionGap { previous: Version, next: Version },
}

/// One applied migration whose file no longer hashes to the stored checksum
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecksumMismatch {
    pub version: Version,
    pub file_name: String,
    pub expected: String,
    pub actual: String,
}

/// Every applied migration whose file content changed since it was applied
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{}", describe_mismatches(.mismatches))]
pub struct ChecksumMismatchError {
    pub mismatches: Vec<ChecksumMismatch>,
}

fn describe_mismatches(mismatches: &[ChecksumMismatch]) -> String {
    let details: Vec<String> = mismatches
        .iter()
        .map(|m| {
            format!(
                "{} (version {}): expected {}, found {}",
                m.file_name, m.version, m.expected, m.actual
            )
        })
        .collect();
    format!(
        "Checksum mismatch in {} applied migration(s): {}",
        mismatches.len(),
        details.join("; ")
    )
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Failed to read migration history: {message}")]
pub struct HistoryReadError {
    pub message: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Failed to record migration {version} in history: {message}")]
pub struct HistoryWriteError {
    pub version: Version,
    pub message: String,
}

/// A migration's SQL failed; its transaction was rolled back
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Migration {version} ({file_name}) failed{}: {cause}", describe_batch(.batch))]
pub struct ExecutionError {
    pub version: Version,
    pub file_name: String,
    /// 1-based batch number, `None` when the failure was outside batch execution
    pub batch: Option<usize>,
    pub cause: String,
}

fn describe_batch(batch: &Option<usize>) -> String {
    match batch {
        Some(n) => format!(" in batch {}", n),
        None => String::new(),
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, MigrationError>;
