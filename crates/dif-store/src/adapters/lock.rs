//! # Database Process Locking
//!
//! Prevents two processes from opening the same file-backed database. The
//! snapshot file is rewritten whole on every commit, so a second writer
//! would silently discard the first one's updates.
//!
//! Uses `fs2` for cross-platform file locking (flock on Unix, LockFile on
//! Windows).

use crate::domain::errors::StorageError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Exclusive lock held for the lifetime of a database handle.
///
/// Released on drop. The lock file itself stays in place: unlinking it
/// would let a process still holding the old file lock it while another
/// process creates and locks a fresh one.
#[derive(Debug)]
pub struct DatabaseLock {
    file: File,
    path: PathBuf,
}

impl DatabaseLock {
    /// Acquire the lock file at `path` without blocking.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be created or another handle holds the lock.
    pub fn acquire(path: &Path) -> Result<Self, StorageError> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StorageError::Io {
                message: format!("cannot create lock file {}: {}", path.display(), e),
            })?;

        if file.try_lock_exclusive().is_err() {
            let holder = Self::read_existing_pid(path)
                .map(|pid| format!(" by process {}", pid))
                .unwrap_or_default();
            return Err(StorageError::Io {
                message: format!("database already in use{} ({})", holder, path.display()),
            });
        }

        file.set_len(0).map_err(StorageError::io)?;
        writeln!(file, "{}", std::process::id()).map_err(StorageError::io)?;
        file.sync_all().map_err(StorageError::io)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_existing_pid(path: &Path) -> Option<u32> {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }
}

impl Drop for DatabaseLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
