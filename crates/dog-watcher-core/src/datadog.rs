//! Datadog API client: exports boards and monitors, posts run events.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::BackupConfig;
use crate::error::{FetchError, NotifyError};
use crate::export::{document_id, reset_kind_dir, write_document, Exporter};
use crate::notify::Notifier;
use crate::outcome::Notification;
use crate::stage::ResourceKind;

/// Tag attached to every event this tool posts.
pub const EVENT_TAG: &str = "dog-watcher";

const SUCCESS_TEXT: &str = "Datadog backup completed successfully.";

#[derive(Debug, Clone)]
pub struct DatadogClient {
    http: Client,
    base_url: String,
    api_key: String,
    app_key: String,
    event_title: String,
}

/// Body of `POST /api/v1/events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRequest {
    pub title: String,
    pub text: String,
    pub alert_type: &'static str,
    pub tags: Vec<String>,
}

impl EventRequest {
    pub fn from_notification(title: &str, notification: &Notification) -> Self {
        let (alert_type, text) = match notification {
            Notification::Verdict {
                success: true,
                message,
            } => ("success", message.clone().unwrap_or_else(|| SUCCESS_TEXT.to_string())),
            Notification::Verdict {
                success: false,
                message,
            } => (
                "error",
                message
                    .clone()
                    .unwrap_or_else(|| "Datadog backup failed.".to_string()),
            ),
            Notification::Informational { message } => ("info", message.clone()),
        };

        Self {
            title: title.to_string(),
            text,
            alert_type,
            tags: vec![EVENT_TAG.to_string()],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrors {
    errors: Vec<String>,
}

impl DatadogClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        app_key: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(format!("dog-watcher/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            app_key: app_key.into(),
            event_title: crate::config::DEFAULT_EVENT_TITLE.to_string(),
        })
    }

    pub fn from_config(config: &BackupConfig) -> Result<Self, FetchError> {
        let mut client = Self::new(
            &config.datadog_api_url,
            &config.datadog_api_key,
            &config.datadog_app_key,
        )?;
        client.event_title = config.event_title.clone();
        Ok(client)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        debug!(path = %path, "GET");
        let response = self
            .http
            .get(self.url(path))
            .header("DD-API-KEY", &self.api_key)
            .header("DD-APPLICATION-KEY", &self.app_key)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let body = read_success(response)
            .await
            .map_err(|(status, body)| api_error(status, body))?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(format!("{path}: {e}")))
    }

    /// List endpoint plus one detail request per board.
    async fn export_boards(
        &self,
        kind: ResourceKind,
        list_key: &str,
        destination: &Path,
    ) -> Result<usize, FetchError> {
        let list_path = format!("/api/v1/{}", kind.name());
        let listing = self.get_json(&list_path).await?;
        let boards = listing
            .get(list_key)
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Decode(format!("{list_path}: missing `{list_key}` array")))?;

        let ids: Vec<String> = boards
            .iter()
            .filter_map(|b| b.get("id").and_then(document_id))
            .collect();
        warn_skipped(kind, boards.len() - ids.len());

        let dir = reset_kind_dir(destination, kind).await?;
        for id in &ids {
            let document = self.get_json(&format!("{list_path}/{id}")).await?;
            write_document(&dir, id, &document).await?;
        }
        Ok(ids.len())
    }

    /// Monitors come back in full from the list endpoint.
    async fn export_monitors(&self, destination: &Path) -> Result<usize, FetchError> {
        let listing = self.get_json("/api/v1/monitor").await?;
        let monitors = listing
            .as_array()
            .ok_or_else(|| FetchError::Decode("/api/v1/monitor: expected an array".to_string()))?;

        let dir = reset_kind_dir(destination, ResourceKind::Monitor).await?;
        let mut written = 0;
        for monitor in monitors {
            if let Some(id) = monitor.get("id").and_then(document_id) {
                write_document(&dir, &id, monitor).await?;
                written += 1;
            }
        }
        warn_skipped(ResourceKind::Monitor, monitors.len() - written);
        Ok(written)
    }
}

/// Listed objects without a usable `id` cannot be named on disk.
fn warn_skipped(kind: ResourceKind, skipped: usize) {
    if skipped > 0 {
        warn!(kind = %kind, skipped = skipped, "Skipping listed objects without an id");
    }
}

/// Body text of a 2xx response, or `(status, body)` otherwise.
async fn read_success(response: Response) -> Result<String, (u16, String)> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_success() {
        Ok(body)
    } else {
        Err((status.as_u16(), body))
    }
}

/// Prefer the API's own `{"errors": [...]}` messages over the raw body.
fn api_error(status: u16, body: String) -> FetchError {
    match serde_json::from_str::<ApiErrors>(&body) {
        Ok(parsed) if !parsed.errors.is_empty() => FetchError::Api(parsed.errors.join("; ")),
        _ => FetchError::Status { status, body },
    }
}

#[async_trait]
impl Exporter for DatadogClient {
    async fn fetch_resources(
        &self,
        kind: ResourceKind,
        destination: &Path,
    ) -> Result<usize, FetchError> {
        let count = match kind {
            ResourceKind::Dash => self.export_boards(kind, "dashes", destination).await?,
            ResourceKind::Screen => self.export_boards(kind, "screenboards", destination).await?,
            ResourceKind::Monitor => self.export_monitors(destination).await?,
        };
        info!(kind = %kind, count = count, "Exported resources");
        Ok(count)
    }
}

#[async_trait]
impl Notifier for DatadogClient {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let request = EventRequest::from_notification(&self.event_title, notification);
        let response = self
            .http
            .post(self.url("/api/v1/events"))
            .header("DD-API-KEY", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        read_success(response)
            .await
            .map_err(|(status, body)| NotifyError::Status { status, body })?;
        debug!(alert_type = request.alert_type, "Event sent to Datadog");
        Ok(())
    }
}
