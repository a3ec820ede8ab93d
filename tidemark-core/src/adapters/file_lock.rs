//! Advisory run lock
//!
//! One runner per database: the lock is an exclusive `fs2` lock on a
//! `<database>.lock` file next to the database. It only guards processes on
//! the same host.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::domain::MigrationError;

/// Lock file path for a database file
pub fn lock_path_for(db_path: &Path) -> PathBuf {
    let mut name = db_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "tidemark".into());
    name.push(".lock");
    db_path.with_file_name(name)
}

/// Held for the duration of a run; released on drop
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock without waiting
    ///
    /// Fails with [`MigrationError::Lock`] when another runner holds it.
    pub fn acquire(path: &Path) -> Result<Self, MigrationError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MigrationError::Lock(format!("{}: {}", parent.display(), e))
                })?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| MigrationError::Lock(format!("{}: {}", path.display(), e)))?;

        file.try_lock_exclusive().map_err(|_| {
            MigrationError::Lock(format!(
                "another migration run holds {}",
                path.display()
            ))
        })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
