//! Migration file and history record types

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::checksum::checksum;

/// Returned when a version string is not a run of ASCII digits that fits in a `u64`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid migration version '{0}'")]
pub struct InvalidVersion(pub String);

/// Migration version
///
/// Keeps the digits exactly as written in the file name (`"007"`) for display,
/// but compares, orders and hashes by numeric value. `"1"` and `"001"` are
/// therefore the same version, and `"010"` sorts after `"009"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Version {
    number: u64,
    text: String,
}

impl Version {
    /// Numeric value used for identity and ordering
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Digits as they appeared in the file name or history table
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl FromStr for Version {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidVersion(s.to_string()));
        }
        let number = trimmed
            .parse::<u64>()
            .map_err(|_| InvalidVersion(s.to_string()))?;
        Ok(Self {
            number,
            text: trimmed.to_string(),
        })
    }
}

impl TryFrom<String> for Version {
    type Error = InvalidVersion;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.text
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.number.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.number.cmp(&other.number)
    }
}

/// A migration discovered on disk
///
/// Built fresh on every scan and never mutated afterwards. The checksum is
/// computed once, at construction.
#[derive(Debug, Clone)]
pub struct MigrationFile {
    version: Version,
    file_name: String,
    file_path: PathBuf,
    sql_content: String,
    checksum: String,
}

impl MigrationFile {
    pub fn new(
        version: Version,
        file_name: impl Into<String>,
        file_path: impl Into<PathBuf>,
        sql_content: impl Into<String>,
    ) -> Self {
        let sql_content = sql_content.into();
        let checksum = checksum(&sql_content);
        Self {
            version,
            file_name: file_name.into(),
            file_path: file_path.into(),
            sql_content,
            checksum,
        }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn sql_content(&self) -> &str {
        &self.sql_content
    }

    /// Hex-encoded SHA-256 of the normalized content
    pub fn checksum(&self) -> &str {
        &self.checksum
    }
}

/// A row of the history table: proof that a migration was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationHistoryRecord {
    pub version: Version,
    pub file_name: String,
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

/// File-on-disk joined with its history record, if any
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub version: Version,
    pub file_name: String,
    pub checksum: String,
    pub is_applied: bool,
    pub checksum_matches: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

impl MigrationStatus {
    pub fn new(file: &MigrationFile, record: Option<&MigrationHistoryRecord>) -> Self {
        Self {
            version: file.version().clone(),
            file_name: file.file_name().to_string(),
            checksum: file.checksum().to_string(),
            is_applied: record.is_some(),
            checksum_matches: record.map_or(true, |r| r.checksum == file.checksum()),
            stored_checksum: record.map(|r| r.checksum.clone()),
            applied_at: record.map(|r| r.applied_at),
            execution_time_ms: record.map(|r| r.execution_time_ms),
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.is_applied
    }
}

/// Per-file status plus history rows that no longer have a file on disk
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    pub statuses: Vec<MigrationStatus>,
    pub missing_files: Vec<MigrationHistoryRecord>,
}

impl StatusReport {
    pub fn applied_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_applied).count()
    }

    pub fn pending_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_pending()).count()
    }

    pub fn mismatch_count(&self) -> usize {
        self.statuses.iter().filter(|s| !s.checksum_matches).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_version_numeric_ordering() {
        let mut versions = vec![v("010"), v("9"), v("001")];
        versions.sort();
        let texts: Vec<&str> = versions.iter().map(|v| v.as_str()).collect();
        assert_eq!(texts, vec!["001", "9", "010"]);
    }

    #[test]
    fn test_version_padding_is_same_identity() {
        assert_eq!(v("1"), v("001"));
        assert_eq!(v("001").to_string(), "001");
    }

    #[test]
    fn test_version_rejects_non_digits() {
        assert!("".parse::<Version>().is_err());
        assert!("1a".parse::<Version>().is_err());
        assert!("-1".parse::<Version>().is_err());
        assert!("99999999999999999999999".parse::<Version>().is_err());
    }

    #[test]
    fn test_version_serializes_as_text() {
        let json = serde_json::to_string(&v("007")).unwrap();
        assert_eq!(json, "\"007\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back.number(), 7);
    }

    #[test]
    fn test_status_checksum_matches() {
        let file = MigrationFile::new(v("001"), "V001__init.sql", "V001__init.sql", "SELECT 1");
        let pending = MigrationStatus::new(&file, None);
        assert!(pending.is_pending());
        assert!(pending.checksum_matches);

        let record = MigrationHistoryRecord {
            version: v("001"),
            file_name: "V001__init.sql".to_string(),
            checksum: "deadbeef".to_string(),
            applied_at: Utc::now(),
            execution_time_ms: 3,
        };
        let tampered = MigrationStatus::new(&file, Some(&record));
        assert!(tampered.is_applied);
        assert!(!tampered.checksum_matches);
        assert_eq!(tampered.stored_checksum.as_deref(), Some("deadbeef"));
    }
}
