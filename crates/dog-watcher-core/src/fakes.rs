//! In-memory fakes for the pipeline collaborators (testing only)
//!
//! Provides `FakeSync`, `FakeExporter`, `RecordingNotifier` and
//! `RecordingWorkspaces`. All of them append to a shared [`CallLog`] so tests
//! can assert the order in which the pipeline touched each collaborator.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{FetchError, NotifyError, SyncError};
use crate::export::{reset_kind_dir, Exporter};
use crate::notify::Notifier;
use crate::outcome::Notification;
use crate::stage::ResourceKind;
use crate::sync::{CommitOutcome, RepositorySync};
use crate::workspace::{TempWorkspaces, WorkspaceManager};

// ---------------------------------------------------------------------------
// CallLog
// ---------------------------------------------------------------------------

/// Ordered record of collaborator calls, shared between fakes.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    /// Position of the first occurrence of `entry`.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|e| e == entry)
    }
}

// ---------------------------------------------------------------------------
// FakeSync
// ---------------------------------------------------------------------------

/// Repository sync that succeeds unless told otherwise.
#[derive(Debug)]
pub struct FakeSync {
    log: CallLog,
    clone_error: Option<String>,
    push_error: Option<String>,
    commit_outcome: CommitOutcome,
    messages: Mutex<Vec<String>>,
}

impl FakeSync {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            clone_error: None,
            push_error: None,
            commit_outcome: CommitOutcome::Committed,
            messages: Mutex::default(),
        }
    }

    pub fn fail_clone(mut self, message: &str) -> Self {
        self.clone_error = Some(message.to_string());
        self
    }

    pub fn fail_push(mut self, message: &str) -> Self {
        self.push_error = Some(message.to_string());
        self
    }

    pub fn nothing_to_commit(mut self) -> Self {
        self.commit_outcome = CommitOutcome::NothingToCommit;
        self
    }

    /// Commit messages received, in order.
    pub fn commit_messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepositorySync for FakeSync {
    async fn clone_repository(&self, _url: &str, _destination: &Path) -> Result<(), SyncError> {
        self.log.record("clone");
        match &self.clone_error {
            Some(message) => Err(SyncError::Rejected(message.clone())),
            None => Ok(()),
        }
    }

    async fn stage_all(&self, _repo: &Path) -> Result<(), SyncError> {
        self.log.record("stage");
        Ok(())
    }

    async fn commit(&self, _repo: &Path, message: &str) -> Result<CommitOutcome, SyncError> {
        self.log.record("commit");
        self.messages.lock().unwrap().push(message.to_string());
        Ok(self.commit_outcome)
    }

    async fn push(&self, _repo: &Path, _remote: &str, _branch: &str) -> Result<(), SyncError> {
        self.log.record("push");
        match &self.push_error {
            Some(message) => Err(SyncError::Rejected(message.clone())),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeExporter
// ---------------------------------------------------------------------------

/// Exporter that writes one placeholder document per kind, or fails on request.
#[derive(Debug)]
pub struct FakeExporter {
    log: CallLog,
    failures: HashMap<ResourceKind, String>,
}

impl FakeExporter {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failures: HashMap::new(),
        }
    }

    pub fn fail_on(mut self, kind: ResourceKind, message: &str) -> Self {
        self.failures.insert(kind, message.to_string());
        self
    }
}

#[async_trait]
impl Exporter for FakeExporter {
    async fn fetch_resources(
        &self,
        kind: ResourceKind,
        destination: &Path,
    ) -> Result<usize, FetchError> {
        self.log.record(format!("export:{}", kind.name()));
        if let Some(message) = self.failures.get(&kind) {
            return Err(FetchError::Api(message.clone()));
        }
        let dir = reset_kind_dir(destination, kind).await?;
        let path = dir.join("1.json");
        tokio::fs::write(&path, b"{}\n")
            .await
            .map_err(|e| FetchError::Write {
                path,
                message: e.to_string(),
            })?;
        Ok(1)
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

/// Notifier that keeps every notification it was handed.
#[derive(Debug)]
pub struct RecordingNotifier {
    log: CallLog,
    error: Option<String>,
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            error: None,
            sent: Mutex::default(),
        }
    }

    /// Record the notification but report a delivery failure.
    pub fn failing(mut self, message: &str) -> Self {
        self.error = Some(message.to_string());
        self
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.log.record("notify");
        self.sent.lock().unwrap().push(notification.clone());
        match &self.error {
            Some(message) => Err(NotifyError::Request(message.clone())),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingWorkspaces
// ---------------------------------------------------------------------------

/// Real temp directories, with every acquire/release recorded.
#[derive(Debug)]
pub struct RecordingWorkspaces {
    log: CallLog,
    inner: TempWorkspaces,
    fail_acquire: bool,
    fail_release: bool,
    released: Mutex<Vec<PathBuf>>,
}

impl RecordingWorkspaces {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            inner: TempWorkspaces::new(),
            fail_acquire: false,
            fail_release: false,
            released: Mutex::default(),
        }
    }

    pub fn failing_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    /// Remove the directory but report the removal as failed.
    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn release_count(&self) -> usize {
        self.released.lock().unwrap().len()
    }

    pub fn released_paths(&self) -> Vec<PathBuf> {
        self.released.lock().unwrap().clone()
    }
}

impl WorkspaceManager for RecordingWorkspaces {
    fn acquire(&self) -> std::io::Result<PathBuf> {
        self.log.record("acquire");
        if self.fail_acquire {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no space left on device",
            ));
        }
        self.inner.acquire()
    }

    fn release(&self, path: &Path) -> std::io::Result<()> {
        self.log.record("release");
        self.released.lock().unwrap().push(path.to_path_buf());
        self.inner.release(path)?;
        if self.fail_release {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "device busy",
            ));
        }
        Ok(())
    }
}
