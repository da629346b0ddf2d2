//! Git command execution.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::SyncError;

/// Result of a command that ran to completion.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Best diagnostic text for a failed command: stderr, else stdout, else the exit code.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("exited with code {}", self.exit_code)
    }
}

/// Runs version-control commands in a working directory.
///
/// A non-zero exit is still `Ok`; only spawn failures and timeouts are errors.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run_command(&self, args: &[&str], cwd: &Path) -> Result<CommandOutput, SyncError>;
}

/// Runs the `git` executable as a subprocess.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    timeout_secs: u64,
}

impl GitCli {
    /// `timeout_secs` of zero disables the timeout.
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            program: "git".to_string(),
            timeout_secs,
        }
    }

    /// Use a different executable (e.g. an absolute path to git).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl CommandRunner for GitCli {
    async fn run_command(&self, args: &[&str], cwd: &Path) -> Result<CommandOutput, SyncError> {
        if args.is_empty() {
            return Err(SyncError::EmptyCommand);
        }

        let start = Instant::now();
        debug!(program = %self.program, args = ?args, cwd = %cwd.display(), "Running command");

        let child = Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SyncError::Spawn {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        let waited = if self.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(self.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| SyncError::Timeout {
                command: format!("{} {}", self.program, args.join(" ")),
                timeout_secs: self.timeout_secs,
            })?
        } else {
            child.wait_with_output().await
        };

        let output = waited.map_err(|e| SyncError::Spawn {
            program: self.program.clone(),
            message: e.to_string(),
        })?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
