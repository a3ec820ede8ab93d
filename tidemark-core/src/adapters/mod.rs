//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the Database port
//! - `fs2` advisory file locks for single-writer runs

pub mod duckdb;
pub mod file_lock;
