//! Error taxonomy and library error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed acquisition attempt.
///
/// The classification drives the retry decision: transient conditions are
/// worth another attempt, structural ones are not (the artifact is simply
/// not there, and retrying burns rate-limited request slots).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport-level failure (connect refused, reset, 5xx, ...).
    NetworkError,

    /// The fetch exceeded its deadline.
    Timeout,

    /// The remote host pushed back (HTTP 429).
    RateLimited,

    /// The resource does not exist (HTTP 404/410).
    NotFound,

    /// The page fetched fine but no artifact reference could be discovered.
    NoArtifactFound,

    /// The artifact was fetched but failed the quality gate
    /// (zero length or wrong content signature).
    InvalidArtifact,

    /// Terminal audit marker: the attempt budget ran out on a retryable error.
    RetryExhausted,
}

impl ErrorKind {
    /// Is another attempt worthwhile for this classification?
    ///
    /// `NotFound` and `NoArtifactFound` describe the structure of the remote
    /// resource, not the attempt; they never become true on retry.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::NetworkError
                | ErrorKind::Timeout
                | ErrorKind::RateLimited
                | ErrorKind::InvalidArtifact
        )
    }

    /// Stable string code used for persistence.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NetworkError => "network_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NoArtifactFound => "no_artifact_found",
            ErrorKind::InvalidArtifact => "invalid_artifact",
            ErrorKind::RetryExhausted => "retry_exhausted",
        }
    }

    /// Parse a persisted string code.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "network_error" => Some(ErrorKind::NetworkError),
            "timeout" => Some(ErrorKind::Timeout),
            "rate_limited" => Some(ErrorKind::RateLimited),
            "not_found" => Some(ErrorKind::NotFound),
            "no_artifact_found" => Some(ErrorKind::NoArtifactFound),
            "invalid_artifact" => Some(ErrorKind::InvalidArtifact),
            "retry_exhausted" => Some(ErrorKind::RetryExhausted),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry-level failure (persistence layer).
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("corrupt row for {id}: {field}={value:?}")]
    CorruptRow {
        id: String,
        field: &'static str,
        value: String,
    },
}

/// Pipeline-level failure (wiring and orchestration, not per-record errors;
/// a single record's failure never surfaces here).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("artifact store error: {0}")]
    ArtifactStore(#[from] std::io::Error),

    #[error("fetch client construction failed: {0}")]
    ClientBuild(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ErrorKind::NetworkError, true)]
    #[case(ErrorKind::Timeout, true)]
    #[case(ErrorKind::RateLimited, true)]
    #[case(ErrorKind::InvalidArtifact, true)]
    #[case(ErrorKind::NotFound, false)]
    #[case(ErrorKind::NoArtifactFound, false)]
    #[case(ErrorKind::RetryExhausted, false)]
    fn retryability(#[case] kind: ErrorKind, #[case] retryable: bool) {
        assert_eq!(kind.is_retryable(), retryable);
    }

    #[test]
    fn string_codes_roundtrip() {
        for kind in [
            ErrorKind::NetworkError,
            ErrorKind::Timeout,
            ErrorKind::RateLimited,
            ErrorKind::NotFound,
            ErrorKind::NoArtifactFound,
            ErrorKind::InvalidArtifact,
            ErrorKind::RetryExhausted,
        ] {
            assert_eq!(ErrorKind::parse(kind.as_str()), Some(kind));
        }
    }
}
