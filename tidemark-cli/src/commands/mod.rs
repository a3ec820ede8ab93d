//! CLI command implementations

pub mod bootstrap;
pub mod logs;
pub mod migrate;
pub mod status;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tidemark_core::config::Config;
use tidemark_core::services::LoggingService;
use tidemark_core::{EntryPoint, TidemarkContext};

/// Project directory from `--project-dir` / TIDEMARK_DIR, or the current directory
pub fn get_project_dir(arg: Option<PathBuf>) -> Result<PathBuf> {
    match arg {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("Could not determine current directory"),
    }
}

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger(project_dir: &Path) -> Option<LoggingService> {
    let config = Config::load(project_dir).ok()?;
    LoggingService::new(&config.state_dir(), EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Open the project: settings, database and event log
pub fn get_context(project_dir: &Path) -> Result<TidemarkContext> {
    if !project_dir.is_dir() {
        anyhow::bail!("Project directory not found: {}", project_dir.display());
    }

    TidemarkContext::new(project_dir, EntryPoint::Cli)
        .context("Failed to initialize tidemark context")
}
