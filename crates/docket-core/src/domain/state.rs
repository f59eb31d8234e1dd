//! Acquisition state machine states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Acquisition state of a document record.
///
/// State transitions:
/// - Pending -> InProgress -> Downloaded
/// - Pending -> InProgress -> Failed -> InProgress (retry, until budget runs out)
/// - Pending -> InProgress -> Skipped (non-retryable error or budget exhausted)
///
/// Design note: state only moves forward along these edges and never skips
/// `InProgress`; the registry enforces this, the enum just names the states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquireState {
    /// Never attempted, or reverted for retry by startup reconciliation.
    Pending,

    /// Claimed by exactly one worker.
    InProgress,

    /// Artifact fetched, validated, and persisted.
    Downloaded,

    /// Last attempt failed; eligible again once its backoff delay passes.
    Failed,

    /// Terminal failure: non-retryable error or attempt budget exhausted.
    Skipped,
}

impl AcquireState {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, AcquireState::Downloaded | AcquireState::Skipped)
    }

    /// Can a worker claim a record in this state?
    pub fn is_claimable(self) -> bool {
        matches!(self, AcquireState::Pending | AcquireState::Failed)
    }

    /// Stable string code used for persistence.
    pub fn as_str(self) -> &'static str {
        match self {
            AcquireState::Pending => "pending",
            AcquireState::InProgress => "in_progress",
            AcquireState::Downloaded => "downloaded",
            AcquireState::Failed => "failed",
            AcquireState::Skipped => "skipped",
        }
    }

    /// Parse a persisted string code.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AcquireState::Pending),
            "in_progress" => Some(AcquireState::InProgress),
            "downloaded" => Some(AcquireState::Downloaded),
            "failed" => Some(AcquireState::Failed),
            "skipped" => Some(AcquireState::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for AcquireState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
