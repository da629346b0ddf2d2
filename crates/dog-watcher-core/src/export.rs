//! Export adapter contract and the on-disk layout of exported resources.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::FetchError;
use crate::stage::ResourceKind;

/// Fetches one kind of remote configuration and writes it under a destination directory.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Returns the number of documents written.
    async fn fetch_resources(
        &self,
        kind: ResourceKind,
        destination: &Path,
    ) -> Result<usize, FetchError>;
}

/// Directory holding all documents of `kind`.
pub fn kind_dir(destination: &Path, kind: ResourceKind) -> PathBuf {
    destination.join(kind.name())
}

/// Empty (or create) the directory for `kind` so upstream deletions show up as removed files.
pub async fn reset_kind_dir(destination: &Path, kind: ResourceKind) -> Result<PathBuf, FetchError> {
    let dir = kind_dir(destination, kind);
    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(FetchError::Write {
                path: dir,
                message: e.to_string(),
            })
        }
    }
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| FetchError::Write {
            path: dir.clone(),
            message: e.to_string(),
        })?;
    Ok(dir)
}

/// Write one document as pretty JSON with a trailing newline, named after its id.
///
/// `dir` is expected to be freshly reset, so an existing file means two ids
/// sanitized to the same name; the later document wins and a warning is logged.
pub async fn write_document<T>(dir: &Path, id: &str, document: &T) -> Result<PathBuf, FetchError>
where
    T: Serialize + ?Sized,
{
    let path = dir.join(format!("{}.json", sanitize_id(id)));
    let mut body = serde_json::to_string_pretty(document).map_err(|e| FetchError::Write {
        path: path.clone(),
        message: format!("failed to serialize document {id}: {e}"),
    })?;
    body.push('\n');
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        warn!(
            id = %id,
            path = %path.display(),
            "Document file name collides with an earlier id, overwriting"
        );
    }
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| FetchError::Write {
            path: path.clone(),
            message: e.to_string(),
        })?;
    Ok(path)
}

/// Render a JSON id (string or number) as a file stem.
pub fn document_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
