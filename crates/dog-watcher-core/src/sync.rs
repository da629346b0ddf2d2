//! Repository sync: clone, stage, commit and push the backup repository.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::SyncError;
use crate::git::{CommandOutput, CommandRunner};

/// Result of a commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,

    /// The staged tree matches HEAD.
    NothingToCommit,
}

/// Operations the pipeline needs from the backup repository.
#[async_trait]
pub trait RepositorySync: Send + Sync {
    /// Clone `url` into the (empty) `destination` directory.
    async fn clone_repository(&self, url: &str, destination: &Path) -> Result<(), SyncError>;

    /// Stage every change in the work tree.
    async fn stage_all(&self, repo: &Path) -> Result<(), SyncError>;

    /// Commit staged changes.
    async fn commit(&self, repo: &Path, message: &str) -> Result<CommitOutcome, SyncError>;

    async fn push(&self, repo: &Path, remote: &str, branch: &str) -> Result<(), SyncError>;
}

/// Committer identity passed to git with `-c user.name=... -c user.email=...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// [`RepositorySync`] on top of a git [`CommandRunner`].
#[derive(Debug, Clone)]
pub struct GitSync<R> {
    runner: R,
    identity: Option<Identity>,
}

impl<R: CommandRunner> GitSync<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    /// Run a command and turn a non-zero exit into [`SyncError::Rejected`].
    async fn checked(&self, args: &[&str], cwd: &Path) -> Result<CommandOutput, SyncError> {
        let output = self.runner.run_command(args, cwd).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(SyncError::Rejected(output.diagnostic()))
        }
    }
}

#[async_trait]
impl<R: CommandRunner> RepositorySync for GitSync<R> {
    async fn clone_repository(&self, url: &str, destination: &Path) -> Result<(), SyncError> {
        self.checked(&["clone", url, "."], destination).await?;
        info!(destination = %destination.display(), "Cloned backup repository");
        Ok(())
    }

    async fn stage_all(&self, repo: &Path) -> Result<(), SyncError> {
        self.checked(&["add", "--all", "."], repo).await?;
        Ok(())
    }

    async fn commit(&self, repo: &Path, message: &str) -> Result<CommitOutcome, SyncError> {
        // exit 0: index matches HEAD, 1: staged changes, anything else is an error
        let diff = self
            .runner
            .run_command(&["diff", "--cached", "--quiet"], repo)
            .await?;
        match diff.exit_code {
            0 => {
                debug!("Index matches HEAD, skipping commit");
                return Ok(CommitOutcome::NothingToCommit);
            }
            1 => {}
            _ => return Err(SyncError::Rejected(diff.diagnostic())),
        }

        let name_arg;
        let email_arg;
        let mut args: Vec<&str> = Vec::new();
        if let Some(identity) = &self.identity {
            name_arg = format!("user.name={}", identity.name);
            email_arg = format!("user.email={}", identity.email);
            args.extend(["-c", name_arg.as_str(), "-c", email_arg.as_str()]);
        }
        args.extend(["commit", "-m", message]);

        self.checked(&args, repo).await?;
        info!(message = %message, "Committed backup");
        Ok(CommitOutcome::Committed)
    }

    async fn push(&self, repo: &Path, remote: &str, branch: &str) -> Result<(), SyncError> {
        self.checked(&["push", remote, branch], repo).await?;
        info!(remote = %remote, branch = %branch, "Pushed backup");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::GitCli;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::process::Command as StdCommand;
    use std::sync::Mutex;

    /// Replays canned exit codes and records the commands it was given.
    #[derive(Default)]
    struct ScriptedRunner {
        exit_codes: Mutex<VecDeque<i32>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        fn new(codes: &[i32]) -> Self {
            Self {
                exit_codes: Mutex::new(codes.iter().copied().collect()),
                calls: Mutex::default(),
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run_command(
            &self,
            args: &[&str],
            _cwd: &Path,
        ) -> Result<CommandOutput, SyncError> {
            self.calls
                .lock()
                .unwrap()
                .push(args.iter().map(|a| a.to_string()).collect());
            let exit_code = self.exit_codes.lock().unwrap().pop_front().unwrap_or(0);
            Ok(CommandOutput {
                exit_code,
                stdout: String::new(),
                stderr: if exit_code == 0 {
                    String::new()
                } else {
                    "scripted failure".to_string()
                },
                duration_ms: 0,
            })
        }
    }

    #[tokio::test]
    async fn test_commit_with_clean_index_is_nothing_to_commit() {
        let sync = GitSync::new(ScriptedRunner::new(&[0]));

        let outcome = sync.commit(Path::new("."), "msg").await.unwrap();
        assert_eq!(outcome, CommitOutcome::NothingToCommit);
        assert_eq!(sync.runner.calls().len(), 1, "commit must not run on a clean index");
    }

    #[tokio::test]
    async fn test_commit_with_staged_changes_commits_with_identity() {
        let sync = GitSync::new(ScriptedRunner::new(&[1, 0])).with_identity(Some(Identity {
            name: "dog-watcher".to_string(),
            email: "dw@example.com".to_string(),
        }));

        let outcome = sync.commit(Path::new("."), "Backup from 10.0.0.5").await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);

        let calls = sync.runner.calls();
        assert_eq!(
            calls[1],
            vec![
                "-c",
                "user.name=dog-watcher",
                "-c",
                "user.email=dw@example.com",
                "commit",
                "-m",
                "Backup from 10.0.0.5"
            ]
        );
    }

    #[tokio::test]
    async fn test_diff_failure_is_rejected() {
        let sync = GitSync::new(ScriptedRunner::new(&[128]));
        let err = sync.commit(Path::new("."), "msg").await.unwrap_err();
        assert_eq!(err, SyncError::Rejected("scripted failure".to_string()));
    }

    #[tokio::test]
    async fn test_push_failure_is_rejected() {
        let sync = GitSync::new(ScriptedRunner::new(&[1]));
        let err = sync.push(Path::new("."), "origin", "master").await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected(_)));
        assert_eq!(sync.runner.calls()[0], vec!["push", "origin", "master"]);
    }

    // -- Real git round trip --------------------------------------------------

    fn run_git(dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    /// Bare remote with one commit on `master`.
    fn make_remote() -> (tempfile::TempDir, PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let remote = root.path().join("remote.git");
        let seed = root.path().join("seed");
        std::fs::create_dir_all(&seed).unwrap();

        run_git(root.path(), &["init", "--bare", "remote.git"]);
        run_git(&remote, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        run_git(&seed, &["init"]);
        run_git(&seed, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        std::fs::write(seed.join("README.md"), "backups\n").unwrap();
        run_git(&seed, &["add", "."]);
        run_git(
            &seed,
            &["-c", "user.name=seed", "-c", "user.email=seed@example.com", "commit", "-m", "init"],
        );
        run_git(&seed, &["push", remote.to_str().unwrap(), "master"]);
        (root, remote)
    }

    fn identity() -> Option<Identity> {
        Some(Identity {
            name: "dog-watcher".to_string(),
            email: "dog-watcher@example.com".to_string(),
        })
    }

    #[tokio::test]
    async fn test_git_clone_commit_push_round_trip() {
        let (root, remote) = make_remote();
        let work = root.path().join("work");
        std::fs::create_dir_all(&work).unwrap();

        let sync = GitSync::new(GitCli::new(60)).with_identity(identity());
        sync.clone_repository(remote.to_str().unwrap(), &work)
            .await
            .unwrap();
        assert!(work.join("README.md").exists());

        std::fs::write(work.join("dash.json"), "{}\n").unwrap();
        sync.stage_all(&work).await.unwrap();
        let outcome = sync.commit(&work, "Backup from test").await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);
        sync.push(&work, "origin", "master").await.unwrap();

        let log = StdCommand::new("git")
            .args(["log", "-1", "--format=%s", "master"])
            .current_dir(&remote)
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&log.stdout).trim(), "Backup from test");
    }

    #[tokio::test]
    async fn test_git_unchanged_tree_is_nothing_to_commit() {
        let (root, remote) = make_remote();
        let work = root.path().join("work");
        std::fs::create_dir_all(&work).unwrap();

        let sync = GitSync::new(GitCli::new(60)).with_identity(identity());
        sync.clone_repository(remote.to_str().unwrap(), &work)
            .await
            .unwrap();
        // rewrite an existing file with identical content
        std::fs::write(work.join("README.md"), "backups\n").unwrap();
        sync.stage_all(&work).await.unwrap();

        let outcome = sync.commit(&work, "Backup").await.unwrap();
        assert_eq!(outcome, CommitOutcome::NothingToCommit);
    }

    #[tokio::test]
    async fn test_git_clone_of_missing_repo_fails() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        std::fs::create_dir_all(&work).unwrap();

        let sync = GitSync::new(GitCli::new(60));
        let missing = root.path().join("nope.git");
        let err = sync
            .clone_repository(missing.to_str().unwrap(), &work)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Rejected(_)));
    }
}
