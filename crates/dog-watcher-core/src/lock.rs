//! Process-level run lock so overlapping scheduler invocations never share a run.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::LockError;

/// Default lock file name, created in the system temp directory.
pub const LOCK_FILE: &str = "dog-watcher.lock";

/// Guard holding an exclusive advisory lock for the duration of a run.
///
/// The lock is released when the guard is dropped (or the process exits).
/// The lock file itself is left in place.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Lock file path used when none is configured.
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join(LOCK_FILE)
    }

    /// Acquire the lock without blocking.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| LockError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        file.try_lock_exclusive()
            .map_err(|_| LockError::Held(path.to_path_buf()))?;

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);

        let first = RunLock::acquire(&path).unwrap();
        let err = RunLock::acquire(&path).unwrap_err();
        assert!(matches!(err, LockError::Held(_)));
        assert_eq!(first.path(), path.as_path());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);

        drop(RunLock::acquire(&path).unwrap());
        assert!(RunLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_unopenable_path_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunLock::acquire(&dir.path().join("missing/dir/lock")).unwrap_err();
        assert!(matches!(err, LockError::Open { .. }));
    }
}
