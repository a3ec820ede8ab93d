//! History store - the persisted record of applied migrations
//!
//! Only ever reads the whole table or appends one row. Rows are never
//! updated or deleted.

use std::collections::BTreeMap;

use crate::domain::{HistoryReadError, HistoryWriteError, MigrationHistoryRecord, Version};
use crate::ports::{Database, HistoryRow};
use crate::services::executor::Transaction;

/// Applied migrations keyed by version
pub type History = BTreeMap<Version, MigrationHistoryRecord>;

pub struct HistoryStore<'a> {
    db: &'a dyn Database,
}

impl<'a> HistoryStore<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    /// Load every history row, keyed by version
    pub fn load_all(&self) -> Result<History, HistoryReadError> {
        let rows = self.db.load_history().map_err(|e| HistoryReadError {
            message: format!("{e:#}"),
        })?;

        let mut history = History::new();
        for row in rows {
            let record = to_record(row)?;
            if let Some(existing) = history.get(&record.version) {
                return Err(HistoryReadError {
                    message: format!(
                        "versions '{}' and '{}' resolve to the same migration",
                        existing.version, record.version
                    ),
                });
            }
            history.insert(record.version.clone(), record);
        }
        Ok(history)
    }

    /// Insert one record as part of `tx`
    ///
    /// The row only becomes visible when the caller commits.
    pub fn append(
        &self,
        tx: &Transaction<'_>,
        record: &MigrationHistoryRecord,
    ) -> Result<(), HistoryWriteError> {
        tx.database()
            .insert_history(record)
            .map_err(|e| HistoryWriteError {
                version: record.version.clone(),
                message: format!("{e:#}"),
            })
    }
}

fn to_record(row: HistoryRow) -> Result<MigrationHistoryRecord, HistoryReadError> {
    let version = row.version.parse::<Version>().map_err(|e| HistoryReadError {
        message: format!("{} ({})", e, row.file_name),
    })?;
    let execution_time_ms = u64::try_from(row.execution_time_ms).map_err(|_| HistoryReadError {
        message: format!(
            "negative execution time {} for version {}",
            row.execution_time_ms, version
        ),
    })?;

    Ok(MigrationHistoryRecord {
        version,
        file_name: row.file_name,
        checksum: row.checksum,
        applied_at: row.applied_at,
        execution_time_ms,
    })
}
