//! Migration file discovery
//!
//! Migration files live in a flat directory and are named
//! `V<digits>__<description>.sql`. Anything else in the directory (READMEs,
//! editor backups, subdirectories) is ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{MigrationFile, ScanError, Version};

/// Version reserved for the bootstrap migration (`V000__*.sql`)
pub const DEFAULT_BOOTSTRAP_VERSION: u64 = 0;

fn file_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^V(\d+)__(.+)\.sql$").expect("migration file name pattern is valid")
    })
}

/// A directory entry whose name matched the migration pattern
struct Candidate {
    version: Version,
    file_name: String,
    path: PathBuf,
}

/// Discovers migration files and returns them in version order
#[derive(Debug, Clone)]
pub struct MigrationFileScanner {
    bootstrap_version: u64,
    allow_version_gaps: bool,
}

impl Default for MigrationFileScanner {
    fn default() -> Self {
        Self {
            bootstrap_version: DEFAULT_BOOTSTRAP_VERSION,
            allow_version_gaps: false,
        }
    }
}

impl MigrationFileScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bootstrap_version(mut self, version: u64) -> Self {
        self.bootstrap_version = version;
        self
    }

    /// A hole in the version sequence (e.g. 1, 2, 4) fails the scan unless
    /// gaps are allowed here
    pub fn with_allow_version_gaps(mut self, allow: bool) -> Self {
        self.allow_version_gaps = allow;
        self
    }

    pub fn bootstrap_version(&self) -> u64 {
        self.bootstrap_version
    }

    /// Scan `dir` for migrations, excluding the bootstrap migration
    ///
    /// Ordered ascending by numeric version. Two files resolving to the same
    /// version (`V1__a.sql`, `V001__b.sql`) are a hard error.
    pub fn scan(&self, dir: &Path) -> Result<Vec<MigrationFile>, ScanError> {
        let mut by_version: BTreeMap<Version, Candidate> = BTreeMap::new();

        for candidate in list_candidates(dir)? {
            if candidate.version.number() == self.bootstrap_version {
                continue;
            }
            if let Some(existing) = by_version.get(&candidate.version) {
                return Err(duplicate(existing, &candidate));
            }
            by_version.insert(candidate.version.clone(), candidate);
        }

        if !self.allow_version_gaps {
            check_gaps(by_version.keys())?;
        }

        by_version.into_values().map(load).collect()
    }

    /// Find the bootstrap migration file, if the directory has one
    pub fn find_bootstrap(&self, dir: &Path) -> Result<Option<MigrationFile>, ScanError> {
        let mut found: Option<Candidate> = None;

        for candidate in list_candidates(dir)? {
            if candidate.version.number() != self.bootstrap_version {
                continue;
            }
            if let Some(existing) = &found {
                return Err(duplicate(existing, &candidate));
            }
            found = Some(candidate);
        }

        found.map(load).transpose()
    }
}

fn list_candidates(dir: &Path) -> Result<Vec<Candidate>, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let io_error = |path: &Path, e: std::io::Error| ScanError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_error(dir, e))? {
        let entry = entry.map_err(|e| io_error(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        // Non-UTF-8 names can't match the pattern
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let Some(captures) = file_name_pattern().captures(&file_name) else {
            continue;
        };

        let version = captures[1]
            .parse::<Version>()
            .map_err(|e| ScanError::InvalidVersion {
                file_name: file_name.clone(),
                message: e.to_string(),
            })?;

        candidates.push(Candidate {
            version,
            file_name,
            path,
        });
    }

    // Stable order for error messages regardless of read_dir order
    candidates.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(candidates)
}

fn load(candidate: Candidate) -> Result<MigrationFile, ScanError> {
    let sql = fs::read_to_string(&candidate.path).map_err(|e| ScanError::Io {
        path: candidate.path.clone(),
        message: e.to_string(),
    })?;
    Ok(MigrationFile::new(
        candidate.version,
        candidate.file_name,
        candidate.path,
        sql,
    ))
}

fn duplicate(first: &Candidate, second: &Candidate) -> ScanError {
    ScanError::DuplicateVersion {
        version: second.version.clone(),
        first: first.file_name.clone(),
        second: second.file_name.clone(),
    }
}

fn check_gaps<'a>(versions: impl Iterator<Item = &'a Version>) -> Result<(), ScanError> {
    let mut previous: Option<&Version> = None;
    for version in versions {
        if let Some(prev) = previous {
            if version.number() > prev.number() + 1 {
                return Err(ScanError::VersionGap {
                    previous: prev.clone(),
                    next: version.clone(),
                });
            }
        }
        previous = Some(version);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    fn versions(files: &[MigrationFile]) -> Vec<String> {
        files.iter().map(|f| f.version().to_string()).collect()
    }

    #[test]
    fn test_scan_orders_numerically() {
        let dir = TempDir::new().unwrap();
        write(&dir, "V010__ten.sql", "SELECT 10;");
        write(&dir, "V003__three.sql", "SELECT 3;");
        write(&dir, "V9__nine.sql", "SELECT 9;");

        let files = MigrationFileScanner::new()
            .with_allow_version_gaps(true)
            .scan(dir.path())
            .unwrap();
        assert_eq!(versions(&files), vec!["003", "9", "010"]);
        assert_eq!(files[0].file_name(), "V003__three.sql");
        assert_eq!(files[0].sql_content(), "SELECT 3;");
        assert_eq!(files[0].checksum().len(), 64);
    }

    #[test]
    fn test_scan_ignores_non_matching_and_bootstrap() {
        let dir = TempDir::new().unwrap();
        write(&dir, "V000__bootstrap.sql", "CREATE TABLE migration_history (x INTEGER);");
        write(&dir, "V001__init.sql", "SELECT 1;");
        write(&dir, "v002__lower_prefix.SQL", "SELECT 2;");
        write(&dir, "README.md", "# migrations");
        write(&dir, "V003_single_underscore.sql", "SELECT 3;");
        write(&dir, "V004__.sql", "SELECT 4;");
        write(&dir, "001__no_prefix.sql", "SELECT 5;");
        fs::create_dir(dir.path().join("V005__directory.sql")).unwrap();

        let files = MigrationFileScanner::new().scan(dir.path()).unwrap();
        assert_eq!(versions(&files), vec!["001", "002"]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = MigrationFileScanner::new().scan(&missing).unwrap_err();
        assert_eq!(err, ScanError::DirectoryNotFound { path: missing });
    }

    #[test]
    fn test_scan_duplicate_version() {
        let dir = TempDir::new().unwrap();
        write(&dir, "V001__first.sql", "SELECT 1;");
        write(&dir, "V1__same.sql", "SELECT 1;");

        let err = MigrationFileScanner::new().scan(dir.path()).unwrap_err();
        match err {
            ScanError::DuplicateVersion { version, first, second } => {
                assert_eq!(version.number(), 1);
                assert_eq!(first, "V001__first.sql");
                assert_eq!(second, "V1__same.sql");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_scan_version_overflow() {
        let dir = TempDir::new().unwrap();
        write(&dir, "V99999999999999999999999__huge.sql", "SELECT 1;");

        let err = MigrationFileScanner::new().scan(dir.path()).unwrap_err();
        assert!(matches!(err, ScanError::InvalidVersion { .. }));
    }

    #[test]
    fn test_scan_gaps() {
        let dir = TempDir::new().unwrap();
        write(&dir, "V001__a.sql", "SELECT 1;");
        write(&dir, "V002__b.sql", "SELECT 2;");
        write(&dir, "V004__d.sql", "SELECT 4;");

        let err = MigrationFileScanner::new().scan(dir.path()).unwrap_err();
        match err {
            ScanError::VersionGap { previous, next } => {
                assert_eq!(previous.number(), 2);
                assert_eq!(next.number(), 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let allowed = MigrationFileScanner::new()
            .with_allow_version_gaps(true)
            .scan(dir.path())
            .unwrap();
        assert_eq!(versions(&allowed), vec!["001", "002", "004"]);
    }

    #[test]
    fn test_gap_after_bootstrap_is_not_a_gap() {
        let dir = TempDir::new().unwrap();
        write(&dir, "V000__bootstrap.sql", "SELECT 0;");
        write(&dir, "V001__a.sql", "SELECT 1;");
        write(&dir, "V002__b.sql", "SELECT 2;");

        let files = MigrationFileScanner::new().scan(dir.path()).unwrap();
        assert_eq!(versions(&files), vec!["001", "002"]);
    }

    #[test]
    fn test_find_bootstrap() {
        let dir = TempDir::new().unwrap();
        write(&dir, "V000__bootstrap.sql", "CREATE TABLE t (x INTEGER);");
        write(&dir, "V001__init.sql", "SELECT 1;");

        let scanner = MigrationFileScanner::new();
        let bootstrap = scanner.find_bootstrap(dir.path()).unwrap().unwrap();
        assert_eq!(bootstrap.file_name(), "V000__bootstrap.sql");

        let empty = TempDir::new().unwrap();
        assert!(scanner.find_bootstrap(empty.path()).unwrap().is_none());
    }

    #[test]
    fn test_custom_bootstrap_version() {
        let dir = TempDir::new().unwrap();
        write(&dir, "V000__zero.sql", "SELECT 0;");
        write(&dir, "V001__init.sql", "SELECT 1;");

        let files = MigrationFileScanner::new()
            .with_bootstrap_version(1)
            .scan(dir.path())
            .unwrap();
        assert_eq!(versions(&files), vec!["000"]);
    }
}
