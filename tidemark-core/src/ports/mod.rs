//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external collaborators: the database
//! connection and the sink for run events. Services depend only on these
//! traits, not on concrete implementations.

pub mod database;
mod event_sink;

pub use database::{Database, HistoryRow, HISTORY_TABLE};
pub use event_sink::{EventSink, MemorySink, NullSink};
