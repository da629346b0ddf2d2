//! Backup pipeline orchestration.
//!
//! One call to [`BackupPipeline::run`] is one backup run:
//!
//! provision → clone → export (dash, screen, monitor) → stage → commit → push
//! → report → release
//!
//! Stages run strictly in order. The first failure skips straight to
//! reporting with its cause preserved. Reporting and workspace release happen
//! on every path, release always last.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;
use uuid::Uuid;

use crate::config::BackupConfig;
use crate::error::BackupError;
use crate::export::Exporter;
use crate::notify::Notifier;
use crate::obs;
use crate::outcome::{Notification, Outcome};
use crate::stage::{ResourceKind, Stage};
use crate::sync::{CommitOutcome, RepositorySync};
use crate::template::{AddressSource, CommitMessageTemplate, SystemInterfaces};
use crate::workspace::{TempWorkspaces, WorkspaceManager};

/// The parts of the configuration the pipeline itself reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub repository_url: String,
    pub commit_template: CommitMessageTemplate,
    pub send_event_on_noop: bool,
    pub remote: String,
    pub branch: String,
}

impl PipelineSettings {
    pub fn from_config(config: &BackupConfig) -> Self {
        Self {
            repository_url: config.git_repo_for_backups.clone(),
            commit_template: config.commit_template(),
            send_event_on_noop: config.send_event_on_noop,
            remote: config.git_remote.clone(),
            branch: config.git_branch.clone(),
        }
    }
}

/// Everything observable about a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,

    /// Workspace used by the run; already removed when the report is returned.
    pub workspace_path: Option<PathBuf>,

    /// Stages that completed, in order.
    pub completed_stages: Vec<Stage>,

    pub outcome: Outcome,

    /// Event handed to the notifier, `None` when notification was suppressed.
    pub notification: Option<Notification>,

    /// Whether the notifier confirmed delivery.
    pub notification_confirmed: bool,

    pub duration_ms: u64,
}

impl RunReport {
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.completed_stages.iter().map(Stage::name).collect()
    }
}

/// Failure of one stage, before it is frozen into an [`Outcome`].
struct StageFailure {
    stage: Stage,
    error: BackupError,
}

/// Attach the running stage to an adapter error.
trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageFailure>;
}

impl<T, E: Into<BackupError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, StageFailure> {
        self.map_err(|e| StageFailure {
            stage,
            error: e.into(),
        })
    }
}

/// Backup pipeline orchestrator.
pub struct BackupPipeline {
    settings: PipelineSettings,
    sync: Arc<dyn RepositorySync>,
    exporter: Arc<dyn Exporter>,
    notifier: Arc<dyn Notifier>,
    workspaces: Arc<dyn WorkspaceManager>,
    addresses: Arc<dyn AddressSource>,
}

impl BackupPipeline {
    pub fn new(
        settings: PipelineSettings,
        sync: Arc<dyn RepositorySync>,
        exporter: Arc<dyn Exporter>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            sync,
            exporter,
            notifier,
            workspaces: Arc::new(TempWorkspaces::new()),
            addresses: Arc::new(SystemInterfaces),
        }
    }

    pub fn with_workspaces(mut self, workspaces: Arc<dyn WorkspaceManager>) -> Self {
        self.workspaces = workspaces;
        self
    }

    pub fn with_addresses(mut self, addresses: Arc<dyn AddressSource>) -> Self {
        self.addresses = addresses;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Execute one backup run. Never returns an error: failures are part of the report.
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        self.run_with_id(run_id).instrument(span).await
    }

    async fn run_with_id(&self, run_id: String) -> RunReport {
        let start = Instant::now();
        obs::emit_run_started(&run_id, &self.settings.repository_url);

        let mut completed = Vec::new();

        obs::emit_stage_started(Stage::Provisioning);
        let (outcome, workspace) = match self.workspaces.acquire() {
            Ok(path) => {
                obs::emit_stage_completed(Stage::Provisioning, elapsed_ms(start));
                completed.push(Stage::Provisioning);
                let outcome = self.execute(&path, &mut completed).await;
                (outcome, Some(path))
            }
            Err(e) => {
                let error = BackupError::Provisioning(e);
                obs::emit_stage_failed(Stage::Provisioning, &error);
                (Outcome::failure(Stage::Provisioning, &error), None)
            }
        };

        let (notification, notification_confirmed) = self.report(&outcome).await;
        completed.push(Stage::Reporting);

        if let Some(path) = &workspace {
            match self.workspaces.release(path) {
                Ok(()) => completed.push(Stage::Releasing),
                Err(e) => obs::emit_cleanup_error(path, &e),
            }
        }

        let duration_ms = elapsed_ms(start);
        obs::emit_run_finished(&run_id, &outcome, duration_ms);

        RunReport {
            run_id,
            workspace_path: workspace,
            completed_stages: completed,
            outcome,
            notification,
            notification_confirmed,
            duration_ms,
        }
    }

    /// Clone through push, classified into an outcome.
    async fn execute(&self, workspace: &Path, completed: &mut Vec<Stage>) -> Outcome {
        match self.sync_and_export(workspace, completed).await {
            Ok(CommitOutcome::Committed) => Outcome::Success,
            Ok(CommitOutcome::NothingToCommit) => {
                obs::emit_nothing_to_commit(self.settings.send_event_on_noop);
                Outcome::NoopSuccess
            }
            Err(failure) => {
                obs::emit_stage_failed(failure.stage, &failure.error);
                Outcome::failure(failure.stage, &failure.error)
            }
        }
    }

    async fn sync_and_export(
        &self,
        workspace: &Path,
        completed: &mut Vec<Stage>,
    ) -> Result<CommitOutcome, StageFailure> {
        let step = StepClock::start(Stage::Cloning);
        self.sync
            .clone_repository(&self.settings.repository_url, workspace)
            .await
            .at(Stage::Cloning)?;
        step.finish(completed);

        for kind in ResourceKind::ORDER {
            let stage = Stage::Exporting(kind);
            let step = StepClock::start(stage);
            self.exporter
                .fetch_resources(kind, workspace)
                .await
                .at(stage)?;
            step.finish(completed);
        }

        let step = StepClock::start(Stage::Staging);
        self.sync.stage_all(workspace).await.at(Stage::Staging)?;
        step.finish(completed);

        let step = StepClock::start(Stage::Committing);
        let message = self.settings.commit_template.resolve(self.addresses.as_ref());
        let committed = self
            .sync
            .commit(workspace, &message)
            .await
            .at(Stage::Committing)?;
        step.finish(completed);

        if committed == CommitOutcome::NothingToCommit {
            return Ok(committed);
        }

        let step = StepClock::start(Stage::Pushing);
        self.sync
            .push(workspace, &self.settings.remote, &self.settings.branch)
            .await
            .at(Stage::Pushing)?;
        step.finish(completed);

        Ok(committed)
    }

    /// Send the notification for `outcome`, if any. Returns it and whether delivery was confirmed.
    async fn report(&self, outcome: &Outcome) -> (Option<Notification>, bool) {
        let Some(notification) = outcome.notification(self.settings.send_event_on_noop) else {
            obs::emit_notification_skipped();
            return (None, false);
        };

        let kind = match &notification {
            Notification::Verdict { success: true, .. } => "success",
            Notification::Verdict { success: false, .. } => "failure",
            Notification::Informational { .. } => "informational",
        };

        let confirmed = match self.notifier.send(&notification).await {
            Ok(()) => {
                obs::emit_notification_sent(kind);
                true
            }
            Err(e) => {
                obs::emit_notification_failed(&e);
                false
            }
        };
        (Some(notification), confirmed)
    }
}

/// Times one stage and logs its start and completion.
struct StepClock {
    stage: Stage,
    started: Instant,
}

impl StepClock {
    fn start(stage: Stage) -> Self {
        obs::emit_stage_started(stage);
        Self {
            stage,
            started: Instant::now(),
        }
    }

    fn finish(self, completed: &mut Vec<Stage>) {
        obs::emit_stage_completed(self.stage, elapsed_ms(self.started));
        completed.push(self.stage);
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{CallLog, FakeExporter, FakeSync, RecordingNotifier, RecordingWorkspaces};
    use crate::template::FixedAddresses;
    use std::net::{IpAddr, Ipv4Addr};

    fn settings(send_event_on_noop: bool) -> PipelineSettings {
        PipelineSettings {
            repository_url: "git@example.com:ops/backup.git".to_string(),
            commit_template: CommitMessageTemplate::new("Backup from {IP}"),
            send_event_on_noop,
            remote: "origin".to_string(),
            branch: "master".to_string(),
        }
    }

    fn pipeline(
        log: &CallLog,
        sync: FakeSync,
        exporter: FakeExporter,
        send_event_on_noop: bool,
    ) -> (BackupPipeline, Arc<RecordingNotifier>, Arc<RecordingWorkspaces>) {
        let notifier = Arc::new(RecordingNotifier::new(log.clone()));
        let workspaces = Arc::new(RecordingWorkspaces::new(log.clone()));
        let pipeline = BackupPipeline::new(
            settings(send_event_on_noop),
            Arc::new(sync),
            Arc::new(exporter),
            notifier.clone(),
        )
        .with_workspaces(workspaces.clone())
        .with_addresses(Arc::new(FixedAddresses(vec![IpAddr::V4(Ipv4Addr::new(
            10, 0, 0, 5,
        ))])));
        (pipeline, notifier, workspaces)
    }

    #[tokio::test]
    async fn test_stage_order_on_success() {
        let log = CallLog::default();
        let (pipeline, _, _) = pipeline(
            &log,
            FakeSync::new(log.clone()),
            FakeExporter::new(log.clone()),
            false,
        );

        let report = pipeline.run().await;
        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(
            report.stage_names(),
            vec![
                "provisioning",
                "cloning",
                "exporting_dash",
                "exporting_screen",
                "exporting_monitor",
                "staging",
                "committing",
                "pushing",
                "reporting",
                "releasing"
            ]
        );
    }

    #[tokio::test]
    async fn test_clone_failure_skips_everything_but_report_and_release() {
        let log = CallLog::default();
        let (pipeline, notifier, workspaces) = pipeline(
            &log,
            FakeSync::new(log.clone()).fail_clone("repository not found"),
            FakeExporter::new(log.clone()),
            false,
        );

        let report = pipeline.run().await;
        assert!(report.outcome.is_failure());
        assert_eq!(log.entries(), vec!["acquire", "clone", "notify", "release"]);
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(workspaces.release_count(), 1);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_change_outcome() {
        let log = CallLog::default();
        let notifier = Arc::new(RecordingNotifier::new(log.clone()).failing("HTTP 403"));
        let workspaces = Arc::new(RecordingWorkspaces::new(log.clone()));
        let pipeline = BackupPipeline::new(
            settings(false),
            Arc::new(FakeSync::new(log.clone())),
            Arc::new(FakeExporter::new(log.clone())),
            notifier,
        )
        .with_workspaces(workspaces.clone())
        .with_addresses(Arc::new(FixedAddresses::default()));

        let report = pipeline.run().await;
        assert_eq!(report.outcome, Outcome::Success);
        assert!(!report.notification_confirmed);
        assert_eq!(workspaces.release_count(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_error_does_not_replace_outcome() {
        let log = CallLog::default();
        let workspaces = Arc::new(RecordingWorkspaces::new(log.clone()).failing_release());
        let pipeline = BackupPipeline::new(
            settings(false),
            Arc::new(FakeSync::new(log.clone()).fail_push("remote rejected")),
            Arc::new(FakeExporter::new(log.clone())),
            Arc::new(RecordingNotifier::new(log.clone())),
        )
        .with_workspaces(workspaces.clone())
        .with_addresses(Arc::new(FixedAddresses::default()));

        let report = pipeline.run().await;
        match &report.outcome {
            Outcome::Failure { cause } => {
                assert_eq!(cause.stage, Stage::Pushing);
                assert_eq!(cause.description, "remote rejected");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(workspaces.release_count(), 1);
        assert!(!report.completed_stages.contains(&Stage::Releasing));
    }
}
