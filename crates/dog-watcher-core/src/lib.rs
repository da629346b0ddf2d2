//! Dog Watcher Core
//!
//! Backs up Datadog dashboards, screenboards and monitors into a git
//! repository, then reports the outcome as a Datadog event.
//!
//! - `pipeline`: the run orchestrator (provision, clone, export, commit, push, report, release)
//! - `sync` / `git`: repository operations on top of the git CLI
//! - `export` / `notify` / `datadog`: the monitoring API side
//! - `fakes`: in-memory collaborators for tests

pub mod config;
pub mod datadog;
pub mod error;
pub mod export;
pub mod fakes;
pub mod git;
pub mod lock;
pub mod notify;
pub mod obs;
pub mod outcome;
pub mod pipeline;
pub mod stage;
pub mod sync;
pub mod telemetry;
pub mod template;
pub mod workspace;

pub use config::BackupConfig;
pub use datadog::DatadogClient;
pub use error::{BackupError, ConfigError, FetchError, LockError, NotifyError, SyncError};
pub use export::Exporter;
pub use git::{CommandOutput, CommandRunner, GitCli};
pub use lock::RunLock;
pub use notify::Notifier;
pub use outcome::{FailureCause, Notification, Outcome, NOOP_MESSAGE};
pub use pipeline::{BackupPipeline, PipelineSettings, RunReport};
pub use stage::{ResourceKind, Stage};
pub use sync::{CommitOutcome, GitSync, Identity, RepositorySync};
pub use telemetry::init_tracing;
pub use template::{
    first_external_ipv4, AddressSource, CommitMessageTemplate, FixedAddresses, SystemInterfaces,
};
pub use workspace::{TempWorkspaces, WorkspaceManager};
