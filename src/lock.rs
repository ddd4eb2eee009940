// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Run serialization.
//!
//! Reconciliation passes are not isolated from one another. When servlink is
//! started by a scheduler that may overlap runs, an advisory lock file keeps
//! a second run from racing the first over the same aliases.

use fs2::FileExt;
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Exclusive advisory lock held for the lifetime of a run.
///
/// Released when dropped.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Acquire lock without blocking.
    ///
    /// Creates the lock file if it does not exist yet.
    ///
    /// # Errors
    ///
    /// - Return [`LockError::Open`] if lock file cannot be opened.
    /// - Return [`LockError::Held`] if another run holds the lock.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|err| LockError::Open {
                source: err,
                path: path.clone(),
            })?;

        FileExt::try_lock_exclusive(&file).map_err(|err| LockError::Held {
            source: err,
            path: path.clone(),
        })?;
        debug!("acquired run lock {:?}", path.display());

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // INVARIANT: Closing the file releases the lock regardless.
        let _ = FileExt::unlock(&self.file);
    }
}

/// Run lock error types.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Lock file cannot be opened or created.
    #[error("failed to open lock file {:?}", path.display())]
    Open {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Another run already holds the lock.
    #[error("another run holds lock file {:?}", path.display())]
    Held {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = LockError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_is_refused_until_release() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let path = scratch.path().join("servlink.lock");

        let first = RunLock::acquire(&path)?;
        assert_eq!(first.path(), path.as_path());
        assert!(matches!(RunLock::acquire(&path), Err(LockError::Held { .. })));

        drop(first);
        let _second = RunLock::acquire(&path)?;

        Ok(())
    }
}
