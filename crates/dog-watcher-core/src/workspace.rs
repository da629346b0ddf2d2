//! Ephemeral per-run workspace directories.

use std::path::{Path, PathBuf};

/// Default directory name prefix for run workspaces.
pub const WORKSPACE_PREFIX: &str = "dog-watcher-work";

/// Creates and removes the scratch directory a run works in.
///
/// The pipeline calls `release` exactly once per successful `acquire`, after
/// the outcome has been reported. Release failures are logged by the caller
/// and never change the run's outcome.
pub trait WorkspaceManager: Send + Sync {
    /// Create a uniquely-named empty directory.
    fn acquire(&self) -> std::io::Result<PathBuf>;

    /// Remove the directory and everything in it.
    fn release(&self, path: &Path) -> std::io::Result<()>;
}

/// Workspaces created under the system temp directory (or a configured root).
#[derive(Debug, Clone)]
pub struct TempWorkspaces {
    root: PathBuf,
    prefix: String,
}

impl TempWorkspaces {
    pub fn new() -> Self {
        Self {
            root: std::env::temp_dir(),
            prefix: WORKSPACE_PREFIX.to_string(),
        }
    }

    /// Create workspaces under `root` instead of the system temp directory.
    pub fn in_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: WORKSPACE_PREFIX.to_string(),
        }
    }
}

impl Default for TempWorkspaces {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceManager for TempWorkspaces {
    fn acquire(&self) -> std::io::Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", self.prefix))
            .tempdir_in(&self.root)?;
        // removal is owned by `release`, not by the guard's drop
        Ok(dir.keep())
    }

    fn release(&self, path: &Path) -> std::io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}
