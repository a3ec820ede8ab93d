//! Database port - the connection migrations are applied through
//!
//! The runner never opens the top-level connection itself. Callers hand it a
//! `Database`; the runner only opens one transaction per migration on it.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::domain::MigrationHistoryRecord;

/// Table that records applied migrations (created by the bootstrap migration)
pub const HISTORY_TABLE: &str = "migration_history";

/// Raw history row as stored; the version is parsed by the history store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub version: String,
    pub file_name: String,
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
    pub execution_time_ms: i64,
}

/// Connection abstraction used by the migration services
///
/// Transactions are flat: `begin` is never called twice without a `commit` or
/// `rollback` in between. Use [`Transaction`](crate::services::Transaction)
/// rather than calling these directly.
pub trait Database: Send + Sync {
    /// Whether the history table exists yet
    fn history_table_exists(&self) -> Result<bool>;

    /// All history rows, ordered by version
    fn load_history(&self) -> Result<Vec<HistoryRow>>;

    /// Insert one history row on the current transaction
    fn insert_history(&self, record: &MigrationHistoryRecord) -> Result<()>;

    /// Execute a batch of one or more SQL statements
    fn execute_batch(&self, sql: &str) -> Result<()>;

    fn begin(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;
}
