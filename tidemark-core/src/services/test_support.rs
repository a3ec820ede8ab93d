//! Test doubles shared by the service tests

use anyhow::Result;

use crate::adapters::duckdb::DuckDbDatabase;
use crate::domain::MigrationHistoryRecord;
use crate::ports::{Database, HistoryRow};

/// Wraps a real database but refuses to roll back
pub struct StuckRollback(pub DuckDbDatabase);

impl Database for StuckRollback {
    fn history_table_exists(&self) -> Result<bool> {
        self.0.history_table_exists()
    }

    fn load_history(&self) -> Result<Vec<HistoryRow>> {
        self.0.load_history()
    }

    fn insert_history(&self, record: &MigrationHistoryRecord) -> Result<()> {
        self.0.insert_history(record)
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        self.0.execute_batch(sql)
    }

    fn begin(&self) -> Result<()> {
        self.0.begin()
    }

    fn commit(&self) -> Result<()> {
        self.0.commit()
    }

    fn rollback(&self) -> Result<()> {
        anyhow::bail!("connection lost")
    }
}
