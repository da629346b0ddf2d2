//! Run outcome classification and the notification derived from it.

use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// Message attached to informational no-op notifications.
pub const NOOP_MESSAGE: &str = "There was nothing new to commit.";

/// Why a run failed: the stage that broke and the error it reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    pub stage: Stage,
    pub description: String,
}

impl FailureCause {
    pub fn new(stage: Stage, error: &dyn std::fmt::Display) -> Self {
        Self {
            stage,
            description: error.to_string(),
        }
    }
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.description)
    }
}

/// Terminal outcome of a backup run. Exactly one is produced per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Changes were committed and pushed.
    Success,

    /// The export matched the repository; nothing was committed.
    NoopSuccess,

    Failure { cause: FailureCause },
}

impl Outcome {
    pub fn failure(stage: Stage, error: &dyn std::fmt::Display) -> Self {
        Outcome::Failure {
            cause: FailureCause::new(stage, error),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure { .. })
    }

    /// Process exit code: zero for `Success` and `NoopSuccess`.
    pub fn exit_code(&self) -> i32 {
        if self.is_failure() {
            1
        } else {
            0
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::NoopSuccess => "noop",
            Outcome::Failure { .. } => "failure",
        }
    }

    /// Derive the notification for this outcome.
    ///
    /// Returns `None` for a no-op run when `send_event_on_noop` is disabled;
    /// the notifier must not be invoked at all in that case.
    pub fn notification(&self, send_event_on_noop: bool) -> Option<Notification> {
        match self {
            Outcome::Success => Some(Notification::Verdict {
                success: true,
                message: None,
            }),
            Outcome::NoopSuccess if send_event_on_noop => Some(Notification::Informational {
                message: NOOP_MESSAGE.to_string(),
            }),
            Outcome::NoopSuccess => None,
            Outcome::Failure { cause } => Some(Notification::Verdict {
                success: false,
                message: Some(cause.description.clone()),
            }),
        }
    }
}

/// Event sent to the monitoring system at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Pass/fail verdict.
    Verdict {
        success: bool,
        message: Option<String>,
    },

    /// Neither pass nor fail, e.g. a run with nothing new to back up.
    Informational { message: String },
}

impl Notification {
    pub fn message(&self) -> Option<&str> {
        match self {
            Notification::Verdict { message, .. } => message.as_deref(),
            Notification::Informational { message } => Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::ResourceKind;

    #[test]
    fn test_success_maps_to_passing_verdict() {
        let n = Outcome::Success.notification(false).unwrap();
        assert_eq!(
            n,
            Notification::Verdict {
                success: true,
                message: None
            }
        );
    }

    #[test]
    fn test_failure_maps_to_failing_verdict_with_cause() {
        let outcome = Outcome::failure(Stage::Exporting(ResourceKind::Monitor), &"rate limited");
        let n = outcome.notification(false).unwrap();
        assert_eq!(
            n,
            Notification::Verdict {
                success: false,
                message: Some("rate limited".to_string())
            }
        );
    }

    #[test]
    fn test_noop_notification_depends_on_flag() {
        assert!(Outcome::NoopSuccess.notification(false).is_none());
        let n = Outcome::NoopSuccess.notification(true).unwrap();
        assert_eq!(n.message(), Some(NOOP_MESSAGE));
        assert!(matches!(n, Notification::Informational { .. }));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Outcome::Success.exit_code(), 0);
        assert_eq!(Outcome::NoopSuccess.exit_code(), 0);
        assert_eq!(Outcome::failure(Stage::Pushing, &"remote rejected").exit_code(), 1);
    }

    #[test]
    fn test_failure_cause_display_names_stage() {
        let cause = FailureCause::new(Stage::Cloning, &"repository not found");
        assert_eq!(cause.to_string(), "cloning failed: repository not found");
    }
}
