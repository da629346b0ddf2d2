//! Dog Watcher - back up Datadog configuration into git
//!
//! Runs one backup and exits; schedule it with cron or a systemd timer.
//! Exit status is zero when the backup succeeded or found nothing new, and
//! non-zero when the run failed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dog_watcher_core::{
    config::DEFAULT_CONFIG_PATH, BackupConfig, BackupPipeline, DatadogClient, GitCli, GitSync,
    Outcome, PipelineSettings, RunLock, RunReport,
};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "dog-watcher")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Back up Datadog dashboards and monitors into a git repository",
    long_about = None
)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "DOG_WATCHER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Lock file serializing concurrent runs (default: <tmp>/dog-watcher.lock)
    #[arg(long, env = "DOG_WATCHER_LOCK")]
    lock_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    dog_watcher_core::init_tracing(cli.json, level);

    let config = BackupConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

    let lock_path = cli.lock_file.clone().unwrap_or_else(RunLock::default_path);
    let _lock = RunLock::acquire(&lock_path).context("Failed to acquire run lock")?;

    let report = build_pipeline(&config)?.run().await;
    print_summary(&report);
    Ok(ExitCode::from(exit_status(&report.outcome)))
}

/// Wire the git and Datadog adapters into a pipeline.
fn build_pipeline(config: &BackupConfig) -> Result<BackupPipeline> {
    let datadog = Arc::new(
        DatadogClient::from_config(config).context("Failed to create Datadog client")?,
    );
    let sync =
        GitSync::new(GitCli::new(config.command_timeout_secs)).with_identity(config.identity());

    Ok(BackupPipeline::new(
        PipelineSettings::from_config(config),
        Arc::new(sync),
        datadog.clone(),
        datadog,
    ))
}

fn print_summary(report: &RunReport) {
    match &report.outcome {
        Outcome::Success => println!("Backup {} pushed", report.run_id),
        Outcome::NoopSuccess => println!("Backup {}: nothing new to commit", report.run_id),
        Outcome::Failure { cause } => eprintln!("Backup {} failed: {}", report.run_id, cause),
    }
    info!(
        run_id = %report.run_id,
        stages = ?report.stage_names(),
        notification_confirmed = report.notification_confirmed,
        "Run complete"
    );
}

fn exit_status(outcome: &Outcome) -> u8 {
    outcome.exit_code() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use dog_watcher_core::Stage;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_runs_without_arguments() {
        let cli = Cli::try_parse_from(["dog-watcher"]).unwrap();
        assert!(!cli.verbose);
        assert!(!cli.json);
        if std::env::var("DOG_WATCHER_CONFIG").is_err() {
            assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        }
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "dog-watcher",
            "--config",
            "/etc/dog-watcher.json",
            "--lock-file",
            "/run/dog-watcher.lock",
            "-v",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/dog-watcher.json"));
        assert_eq!(cli.lock_file, Some(PathBuf::from("/run/dog-watcher.lock")));
        assert!(cli.verbose);
        assert!(cli.json);
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_status(&Outcome::Success), 0);
        assert_eq!(exit_status(&Outcome::NoopSuccess), 0);
        assert_eq!(
            exit_status(&Outcome::failure(Stage::Pushing, &"remote rejected")),
            1
        );
    }

    #[test]
    fn test_build_pipeline_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "gitRepoForBackups": "git@example.com:ops/datadog-backup.git",
                "datadogApiKey": "api",
                "datadogAppKey": "app",
                "gitBranch": "main"
            }"#,
        )
        .unwrap();

        let config = BackupConfig::load(&path).unwrap();
        let pipeline = build_pipeline(&config).unwrap();
        assert_eq!(pipeline.settings().branch, "main");
        assert_eq!(
            pipeline.settings().repository_url,
            "git@example.com:ops/datadog-backup.git"
        );
    }
}
