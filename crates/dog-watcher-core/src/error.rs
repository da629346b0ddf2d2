//! Error taxonomy for the backup pipeline and its collaborators.
//!
//! "Nothing to commit" is deliberately absent: the sync adapter reports it as
//! [`CommitOutcome::NothingToCommit`](crate::sync::CommitOutcome), not as an error.

use std::path::PathBuf;

/// Errors raised by the repository sync adapter (clone, stage, commit, push).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("`{command}` timed out after {timeout_secs} seconds")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("command must not be empty")]
    EmptyCommand,

    /// The command ran and exited unsuccessfully; carries its diagnostic output.
    #[error("{0}")]
    Rejected(String),
}

/// Errors raised while exporting resources from the monitoring API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Error messages reported by the API itself.
    #[error("{0}")]
    Api(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Errors raised while delivering a notification event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Errors that abort a pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("workspace provisioning failed: {0}")]
    Provisioning(#[from] std::io::Error),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Another run holds the run lock, or the lock file is unusable.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another backup run is in progress (lock held on {0})")]
    Held(PathBuf),

    #[error("failed to open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
