//! Firmware update records and their state machine.

use core::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use powershelf_errors::ValidationError;
use powershelf_types::{Component, MacAddr};
use serde::{Deserialize, Serialize};

use crate::FirmwareVersion;

/// Progress of one firmware upgrade.
///
/// `Queued -> Verifying -> Completed | Failed`, with `Verifying` allowed to
/// repeat. Any non-terminal state may fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FirmwareState {
    /// Accepted, image not yet pushed
    Queued,
    /// Image pushed, waiting for the device to report the target version
    Verifying,
    /// Device reports the target version
    Completed,
    /// Gave up; see the record's error message
    Failed,
}

impl FirmwareState {
    /// Stored and displayed name.
    pub fn as_str(self) -> &'static str {
        match self {
            FirmwareState::Queued => "Queued",
            FirmwareState::Verifying => "Verifying",
            FirmwareState::Completed => "Completed",
            FirmwareState::Failed => "Failed",
        }
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, FirmwareState::Completed | FirmwareState::Failed)
    }

    /// Whether the state machine permits `self -> next`.
    pub fn can_transition_to(self, next: FirmwareState) -> bool {
        use FirmwareState::{Completed, Failed, Queued, Verifying};
        matches!(
            (self, next),
            (Queued, Verifying | Failed) | (Verifying, Verifying | Completed | Failed)
        )
    }
}

impl fmt::Display for FirmwareState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FirmwareState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Queued" => Ok(FirmwareState::Queued),
            "Verifying" => Ok(FirmwareState::Verifying),
            "Completed" => Ok(FirmwareState::Completed),
            "Failed" => Ok(FirmwareState::Failed),
            other => Err(ValidationError::invalid_format("state", other)),
        }
    }
}

/// One upgrade attempt of one component on one PMC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareUpdate {
    /// Store-assigned identifier
    pub id: i64,
    /// Target PMC
    pub mac: MacAddr,
    /// Target component
    pub component: Component,
    /// Version reported by the device when the upgrade was accepted
    pub version_from: FirmwareVersion,
    /// Requested version
    pub version_to: FirmwareVersion,
    /// Current state
    pub state: FirmwareState,
    /// When `state` last changed
    pub last_transition_time: DateTime<Utc>,
    /// Last time reconciliation looked at this record
    pub updated_at: DateTime<Utc>,
    /// When the upgrade was accepted
    pub created_at: DateTime<Utc>,
    /// Device job identifier, if the device reported one
    pub job_id: Option<String>,
    /// Why the last reconciliation did not make progress
    pub error_message: Option<String>,
}

impl FirmwareUpdate {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
