//! File-based locking to prevent concurrent runs.
//!
//! Both programs rewrite shared files under /etc/postfix, so a run holds an
//! flock-style advisory lock for its whole duration.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::PhishTrapError;

/// A guard that holds an exclusive lock on the lock file.
/// The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct LockGuard {
    _file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Attempt to acquire an exclusive lock without blocking.
    /// Returns an error if another run holds it.
    pub fn acquire(lock_path: &Path) -> Result<Self, PhishTrapError> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).ok(); // /run should exist, but just in case
        }

        // Open without truncating so the file is never replaced under a holder
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| {
                PhishTrapError::Lock(format!(
                    "failed to open lock file {}: {}",
                    lock_path.display(),
                    e
                ))
            })?;

        file.try_lock_exclusive().map_err(|_| {
            PhishTrapError::Lock(format!(
                "another run is already updating the lookup files.\n\
                 If you believe this is an error, remove the lock file: {}",
                lock_path.display()
            ))
        })?;

        Ok(Self {
            _file: file,
            path: lock_path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
