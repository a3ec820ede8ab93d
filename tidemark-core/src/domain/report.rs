//! Run state machine states and run reports

use std::time::Duration;

use serde::Serialize;

use super::migration::{MigrationHistoryRecord, Version};
use super::result::MigrationError;

/// States a [`MigrationRunner`](crate::services::MigrationRunner) moves through
///
/// `Idle → Scanning → Validating → (NoPending | Executing) → Completed | Aborted`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Scanning,
    Validating,
    NoPending,
    Executing,
    Completed,
    Aborted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted)
    }
}

/// End-of-run outcome surfaced to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Aborted,
}

/// Timing entry for one migration applied during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub version: Version,
    pub file_name: String,
    pub execution_time_ms: u64,
}

impl From<&MigrationHistoryRecord> for AppliedMigration {
    fn from(record: &MigrationHistoryRecord) -> Self {
        Self {
            version: record.version.clone(),
            file_name: record.file_name.clone(),
            execution_time_ms: record.execution_time_ms,
        }
    }
}

/// Result of a migration run
///
/// An aborted run still produces a report: `migrations` lists what was
/// committed before the failure and `error` says why the run stopped.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub executed_count: usize,
    pub migrations: Vec<AppliedMigration>,
    pub total_elapsed_ms: u64,
    pub outcome: RunOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MigrationError>,
}

impl RunReport {
    pub fn new(
        migrations: Vec<AppliedMigration>,
        elapsed: Duration,
        error: Option<MigrationError>,
    ) -> Self {
        Self {
            executed_count: migrations.len(),
            migrations,
            total_elapsed_ms: elapsed.as_millis() as u64,
            outcome: if error.is_some() {
                RunOutcome::Aborted
            } else {
                RunOutcome::Completed
            },
            error,
        }
    }

    /// Report for a run that was refused before it started
    pub fn aborted(error: MigrationError) -> Self {
        Self::new(Vec::new(), Duration::ZERO, Some(error))
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Convert into a `Result`, for callers that refuse to start on failure
    pub fn into_result(self) -> Result<Vec<AppliedMigration>, MigrationError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.migrations),
        }
    }
}

/// A migration that would be applied by the next run
#[derive(Debug, Clone, Serialize)]
pub struct PendingMigration {
    pub version: Version,
    pub file_name: String,
    pub checksum: String,
    pub batch_count: usize,
}

/// Result of validating without executing
#[derive(Debug, Clone, Serialize)]
pub struct DryRunReport {
    pub applied_count: usize,
    pub pending: Vec<PendingMigration>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::ExecutionError;

    fn applied(version: &str, ms: u64) -> AppliedMigration {
        AppliedMigration {
            version: version.parse().unwrap(),
            file_name: format!("V{}__test.sql", version),
            execution_time_ms: ms,
        }
    }

    #[test]
    fn test_completed_report() {
        let report = RunReport::new(
            vec![applied("001", 4), applied("002", 7)],
            Duration::from_millis(15),
            None,
        );
        assert!(report.is_completed());
        assert_eq!(report.executed_count, 2);
        assert_eq!(report.total_elapsed_ms, 15);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "completed");
        assert_eq!(json["migrations"][1]["version"], "002");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_aborted_report_keeps_committed_migrations() {
        let error = MigrationError::from(ExecutionError {
            version: "002".parse().unwrap(),
            file_name: "V002__test.sql".to_string(),
            batch: Some(1),
            cause: "syntax error".to_string(),
        });
        let report = RunReport::new(vec![applied("001", 4)], Duration::from_millis(9), Some(error));
        assert_eq!(report.outcome, RunOutcome::Aborted);
        assert_eq!(report.executed_count, 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "aborted");
        assert_eq!(json["error"]["kind"], "execution");

        let err = report.into_result().unwrap_err();
        assert_eq!(err.kind(), "execution");
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Aborted.is_terminal());
        assert!(!RunState::Executing.is_terminal());
    }
}
