//! Checksum validation and the applied/pending diff
//!
//! Pure functions over a scanned file list and a loaded history map. Nothing
//! here touches the filesystem or the database.

use crate::domain::{
    ChecksumMismatch, ChecksumMismatchError, MigrationFile, MigrationStatus, StatusReport,
};
use crate::services::history::History;

/// Check every applied file against its stored checksum
///
/// Collects all mismatches rather than stopping at the first, so the report
/// names every file that changed.
pub fn validate(files: &[MigrationFile], history: &History) -> Result<(), ChecksumMismatchError> {
    let mismatches: Vec<ChecksumMismatch> = files
        .iter()
        .filter_map(|file| {
            let record = history.get(file.version())?;
            (record.checksum != file.checksum()).then(|| ChecksumMismatch {
                version: file.version().clone(),
                file_name: file.file_name().to_string(),
                expected: record.checksum.clone(),
                actual: file.checksum().to_string(),
            })
        })
        .collect();

    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(ChecksumMismatchError { mismatches })
    }
}

/// Files with no history record, ascending by version
///
/// Version order is the only execution order; there is no dependency analysis.
pub fn compute_pending<'f>(files: &'f [MigrationFile], history: &History) -> Vec<&'f MigrationFile> {
    let mut pending: Vec<&MigrationFile> = files
        .iter()
        .filter(|file| !history.contains_key(file.version()))
        .collect();
    pending.sort_by(|a, b| a.version().cmp(b.version()));
    pending
}

/// Join files with history for display
pub fn build_statuses(files: &[MigrationFile], history: &History) -> StatusReport {
    let mut statuses: Vec<MigrationStatus> = files
        .iter()
        .map(|file| MigrationStatus::new(file, history.get(file.version())))
        .collect();
    statuses.sort_by(|a, b| a.version.cmp(&b.version));

    let missing_files = history
        .values()
        .filter(|record| !files.iter().any(|f| f.version() == &record.version))
        .cloned()
        .collect();

    StatusReport {
        statuses,
        missing_files,
    }
}
