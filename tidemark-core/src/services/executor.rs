//! Transactional executor - applies one migration atomically
//!
//! All batches of a migration and its history row share a single transaction.
//! Either everything commits, or nothing does.

use std::time::Instant;

use anyhow::Result;
use chrono::{SubsecRound, Utc};

use crate::domain::{ExecutionError, MigrationError, MigrationFile, MigrationHistoryRecord};
use crate::ports::Database;
use crate::services::history::HistoryStore;
use crate::services::splitter::BatchSplitter;

/// An open transaction on a [`Database`]
///
/// Rolls back on drop unless [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) was called.
pub struct Transaction<'a> {
    db: &'a dyn Database,
    open: bool,
}

impl<'a> Transaction<'a> {
    pub fn begin(db: &'a dyn Database) -> Result<Self> {
        db.begin()?;
        Ok(Self { db, open: true })
    }

    /// The connection this transaction runs on
    pub fn database(&self) -> &'a dyn Database {
        self.db
    }

    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.db.execute_batch(sql)
    }

    pub fn commit(mut self) -> Result<()> {
        self.open = false;
        if let Err(e) = self.db.commit() {
            return Err(match self.db.rollback() {
                Ok(()) => e,
                Err(rollback) => e.context(format!("rollback failed: {rollback:#}")),
            });
        }
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.open = false;
        self.db.rollback()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.open {
            let _ = self.db.rollback();
        }
    }
}

/// Applies a single migration inside one transaction
#[derive(Debug, Clone, Default)]
pub struct TransactionalExecutor {
    splitter: BatchSplitter,
}

impl TransactionalExecutor {
    pub fn new(splitter: BatchSplitter) -> Self {
        Self { splitter }
    }

    pub fn splitter(&self) -> &BatchSplitter {
        &self.splitter
    }

    /// Apply `file` and record it in history
    ///
    /// On success the returned record is exactly what was committed. On
    /// failure the transaction is rolled back: no batch persists and no
    /// history row is written, even if earlier batches had succeeded.
    pub fn apply(
        &self,
        file: &MigrationFile,
        db: &dyn Database,
        history: &HistoryStore<'_>,
    ) -> Result<MigrationHistoryRecord, MigrationError> {
        let batches = self.splitter.split(file.sql_content());
        let started = Instant::now();

        let tx = Transaction::begin(db)
            .map_err(|e| execution_error(file, None, format!("failed to begin transaction: {e:#}")))?;

        for (index, batch) in batches.iter().enumerate() {
            if let Err(e) = tx.execute_batch(batch) {
                let cause = with_rollback_outcome(tx, format!("{e:#}"));
                return Err(execution_error(file, Some(index + 1), cause));
            }
        }

        let record = MigrationHistoryRecord {
            version: file.version().clone(),
            file_name: file.file_name().to_string(),
            checksum: file.checksum().to_string(),
            applied_at: Utc::now().trunc_subsecs(6),
            execution_time_ms: started.elapsed().as_millis() as u64,
        };

        if let Err(mut e) = history.append(&tx, &record) {
            e.message = with_rollback_outcome(tx, e.message);
            return Err(e.into());
        }

        tx.commit()
            .map_err(|e| execution_error(file, None, format!("commit failed: {e:#}")))?;

        Ok(record)
    }
}

/// Roll `tx` back, keeping a rollback failure next to the original cause
pub(crate) fn with_rollback_outcome(tx: Transaction<'_>, cause: String) -> String {
    match tx.rollback() {
        Ok(()) => cause,
        Err(e) => format!("{cause}; rollback failed: {e:#}"),
    }
}

fn execution_error(file: &MigrationFile, batch: Option<usize>, cause: String) -> MigrationError {
    ExecutionError {
        version: file.version().clone(),
        file_name: file.file_name().to_string(),
        batch,
        cause,
    }
    .into()
}
