//! Notifier contract.

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::outcome::Notification;

/// Sends the end-of-run event to the monitoring system.
///
/// `Ok(())` is the confirmation the pipeline waits for before releasing the workspace.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}
