//! Configuration management
//!
//! Project settings live in an optional `tidemark.json` in the project dir:
//! ```json
//! {
//!   "database": "app.duckdb",
//!   "migrationsDir": "db/migrations",
//!   "batchSeparator": "GO",
//!   "bootstrapVersion": 0,
//!   "allowVersionGaps": true
//! }
//! ```
//! Keys the runner does not know about are kept, so other tools can share the
//! file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::services::{DEFAULT_BATCH_SEPARATOR, DEFAULT_BOOTSTRAP_VERSION};

/// Settings file name inside the project directory
pub const SETTINGS_FILE: &str = "tidemark.json";

/// Directory for the event log database inside the project dir
pub const STATE_DIR: &str = ".tidemark";

const DEFAULT_DATABASE: &str = "tidemark.duckdb";
const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// Raw tidemark.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    migrations_dir: Option<String>,
    #[serde(default)]
    batch_separator: Option<String>,
    #[serde(default)]
    bootstrap_version: Option<u64>,
    #[serde(default)]
    allow_version_gaps: Option<bool>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Resolved runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub database_path: PathBuf,
    pub migrations_dir: PathBuf,
    pub batch_separator: String,
    pub bootstrap_version: u64,
    pub allow_version_gaps: bool,
}

impl Config {
    /// Load config from the project directory
    ///
    /// Database and migrations paths can be overridden via:
    /// 1. Settings file (`database`, `migrationsDir`)
    /// 2. Environment variables TIDEMARK_DATABASE / TIDEMARK_MIGRATIONS_DIR
    pub fn load(project_dir: &Path) -> Result<Self> {
        let settings_path = project_dir.join(SETTINGS_FILE);

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid settings in {}", settings_path.display()))?
        } else {
            SettingsFile::default()
        };

        Self::from_settings(project_dir, raw, |key| std::env::var(key).ok())
    }

    fn from_settings(
        project_dir: &Path,
        raw: SettingsFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let database = env("TIDEMARK_DATABASE")
            .or(raw.database)
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        let migrations_dir = env("TIDEMARK_MIGRATIONS_DIR")
            .or(raw.migrations_dir)
            .unwrap_or_else(|| DEFAULT_MIGRATIONS_DIR.to_string());

        let batch_separator = raw
            .batch_separator
            .unwrap_or_else(|| DEFAULT_BATCH_SEPARATOR.to_string());
        if batch_separator.trim().is_empty() {
            anyhow::bail!("batchSeparator must not be empty");
        }

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            database_path: resolve(project_dir, &database),
            migrations_dir: resolve(project_dir, &migrations_dir),
            batch_separator: batch_separator.trim().to_string(),
            bootstrap_version: raw.bootstrap_version.unwrap_or(DEFAULT_BOOTSTRAP_VERSION),
            allow_version_gaps: raw.allow_version_gaps.unwrap_or(false),
        })
    }

    /// Directory holding `logs.duckdb`
    pub fn state_dir(&self) -> PathBuf {
        self.project_dir.join(STATE_DIR)
    }
}

/// Relative paths are taken relative to the project directory
fn resolve(project_dir: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::from_settings(dir.path(), SettingsFile::default(), no_env).unwrap();

        assert_eq!(config.database_path, dir.path().join("tidemark.duckdb"));
        assert_eq!(config.migrations_dir, dir.path().join("migrations"));
        assert_eq!(config.batch_separator, "GO");
        assert_eq!(config.bootstrap_version, 0);
        assert!(!config.allow_version_gaps);
        assert_eq!(config.state_dir(), dir.path().join(".tidemark"));
    }

    #[test]
    fn test_load_settings_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{
                "database": "data/app.duckdb",
                "migrationsDir": "db/migrations",
                "batchSeparator": "go",
                "bootstrapVersion": 1,
                "allowVersionGaps": true,
                "editor": { "tabWidth": 4 }
            }"#,
        )
        .unwrap();

        let raw: SettingsFile =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap())
                .unwrap();
        assert!(raw.other.contains_key("editor"));

        let config = Config::from_settings(dir.path(), raw, no_env).unwrap();
        assert_eq!(config.database_path, dir.path().join("data/app.duckdb"));
        assert_eq!(config.migrations_dir, dir.path().join("db/migrations"));
        assert_eq!(config.batch_separator, "go");
        assert_eq!(config.bootstrap_version, 1);
        assert!(config.allow_version_gaps);
    }

    #[test]
    fn test_env_overrides_settings() {
        let dir = TempDir::new().unwrap();
        let raw = SettingsFile {
            database: Some("from_file.duckdb".to_string()),
            ..Default::default()
        };
        let config = Config::from_settings(dir.path(), raw, |key| match key {
            "TIDEMARK_DATABASE" => Some("/var/lib/app.duckdb".to_string()),
            "TIDEMARK_MIGRATIONS_DIR" => Some("sql".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/app.duckdb"));
        assert_eq!(config.migrations_dir, dir.path().join("sql"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{ not json").unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid settings"));
    }

    #[test]
    fn test_blank_separator_rejected() {
        let dir = TempDir::new().unwrap();
        let raw = SettingsFile {
            batch_separator: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(Config::from_settings(dir.path(), raw, no_env).is_err());
    }
}
