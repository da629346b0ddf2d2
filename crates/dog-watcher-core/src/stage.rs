//! Pipeline stages and exported resource kinds.

use serde::{Deserialize, Serialize};

/// Kinds of monitoring configuration exported on every run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Timeboards (`/api/v1/dash`).
    Dash,

    /// Screenboards (`/api/v1/screen`).
    Screen,

    /// Monitors (`/api/v1/monitor`).
    Monitor,
}

impl ResourceKind {
    /// Export order used by every run.
    pub const ORDER: [ResourceKind; 3] = [
        ResourceKind::Dash,
        ResourceKind::Screen,
        ResourceKind::Monitor,
    ];

    /// Get the kind name as a string. Doubles as the directory name in the backup repository.
    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Dash => "dash",
            ResourceKind::Screen => "screen",
            ResourceKind::Monitor => "monitor",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// States a backup run moves through, in order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Provisioning,
    Cloning,
    Exporting(ResourceKind),
    Staging,
    Committing,
    Pushing,
    Reporting,
    Releasing,
}

impl Stage {
    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Provisioning => "provisioning",
            Stage::Cloning => "cloning",
            Stage::Exporting(ResourceKind::Dash) => "exporting_dash",
            Stage::Exporting(ResourceKind::Screen) => "exporting_screen",
            Stage::Exporting(ResourceKind::Monitor) => "exporting_monitor",
            Stage::Staging => "staging",
            Stage::Committing => "committing",
            Stage::Pushing => "pushing",
            Stage::Reporting => "reporting",
            Stage::Releasing => "releasing",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
