//! Backup configuration loaded from a JSON file.
//!
//! Secrets can be supplied through the environment instead of the file:
//! `DD_API_KEY` and `DD_APP_KEY` override `datadog_api_key` / `datadog_app_key`.

use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::sync::Identity;
use crate::template::{CommitMessageTemplate, IP_PLACEHOLDER};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Datadog backup from {IP}";
pub const DEFAULT_DATADOG_API_URL: &str = "https://api.datadoghq.com";
pub const DEFAULT_EVENT_TITLE: &str = "Datadog backup";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Everything a backup run needs to know, read once at startup.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupConfig {
    /// Clone URL of the repository receiving the backups.
    pub git_repo_for_backups: String,

    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// Report runs that found nothing new to commit.
    #[serde(default, deserialize_with = "bool_or_string")]
    pub send_event_on_noop: bool,

    #[serde(default)]
    pub datadog_api_key: String,

    #[serde(default)]
    pub datadog_app_key: String,

    #[serde(default = "default_api_url")]
    pub datadog_api_url: String,

    #[serde(default = "default_event_title")]
    pub event_title: String,

    #[serde(default = "default_remote")]
    pub git_remote: String,

    #[serde(default = "default_branch")]
    pub git_branch: String,

    #[serde(default)]
    pub git_author_name: Option<String>,

    #[serde(default)]
    pub git_author_email: Option<String>,

    /// Per-command timeout for git subprocesses; zero disables it.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_commit_message() -> String {
    DEFAULT_COMMIT_MESSAGE.to_string()
}

fn default_api_url() -> String {
    DEFAULT_DATADOG_API_URL.to_string()
}

fn default_event_title() -> String {
    DEFAULT_EVENT_TITLE.to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

/// Accept `true`, `false`, `"true"` and `"false"`.
fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected \"true\" or \"false\", got {other:?}"
            ))),
        },
    }
}

impl BackupConfig {
    /// Parse, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json(&raw)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Overlay secrets from the environment; `lookup` is `std::env::var` outside tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("DD_API_KEY").filter(|k| !k.is_empty()) {
            self.datadog_api_key = key;
        }
        if let Some(key) = lookup("DD_APP_KEY").filter(|k| !k.is_empty()) {
            self.datadog_app_key = key;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.git_repo_for_backups.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "gitRepoForBackups must not be empty".to_string(),
            ));
        }
        if self.datadog_api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "datadogApiKey (or DD_API_KEY) must be set".to_string(),
            ));
        }
        if self.datadog_app_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "datadogAppKey (or DD_APP_KEY) must be set".to_string(),
            ));
        }
        if self.commit_template().placeholder_count() > 1 {
            return Err(ConfigError::Invalid(format!(
                "commitMessage may contain at most one {IP_PLACEHOLDER}"
            )));
        }
        if self.git_remote.trim().is_empty() || self.git_branch.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "gitRemote and gitBranch must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn commit_template(&self) -> CommitMessageTemplate {
        CommitMessageTemplate::new(self.commit_message.clone())
    }

    /// Committer identity, when both name and email are configured.
    pub fn identity(&self) -> Option<Identity> {
        match (&self.git_author_name, &self.git_author_email) {
            (Some(name), Some(email)) => Some(Identity {
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        }
    }
}
