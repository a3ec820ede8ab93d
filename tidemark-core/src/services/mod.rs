//! Service layer - migration orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on one step of a run: scanning, hashing, splitting, validating,
//! executing, recording.

pub mod bootstrap;
pub mod checksum;
mod executor;
pub mod history;
pub mod logging;
mod runner;
pub mod scanner;
pub mod splitter;
#[cfg(test)]
mod test_support;
pub mod validator;

pub use bootstrap::{BootstrapResult, BootstrapService, DEFAULT_BOOTSTRAP_SQL};
pub use executor::{Transaction, TransactionalExecutor};
pub use history::{History, HistoryStore};
pub use logging::{EntryPoint, LogEntry, LoggingService};
pub use runner::{CancellationToken, MigrationRunner};
pub use scanner::{MigrationFileScanner, DEFAULT_BOOTSTRAP_VERSION};
pub use splitter::{BatchSplitter, DEFAULT_BATCH_SEPARATOR};
