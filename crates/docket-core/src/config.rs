//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::RetryPolicy;

/// Tunable knobs for an acquisition run.
///
/// Defaults are deliberately conservative: the remote host collapses rather
/// than degrades once concurrency or request rate crosses a small threshold,
/// so both ceilings sit well below the observed breaking point.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of concurrent workers.
    pub workers: usize,

    /// Maximum fetch attempts per record before it is skipped.
    pub max_attempts: u32,

    /// Aggregate outbound request ceiling, shared by all workers.
    pub requests_per_second: f64,

    /// Deadline for one fetch (applies to every request).
    #[serde(with = "duration_secs")]
    pub fetch_timeout: Duration,

    /// TCP connect deadline.
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Backoff policy for retried records.
    #[serde(skip)]
    pub retry: RetryPolicy,

    /// Registry database location.
    pub db_path: PathBuf,

    /// Root directory for stored artifacts.
    pub artifact_dir: PathBuf,

    /// User-Agent header sent with every request.
    pub user_agent: String,

    /// How long an idle worker sleeps before re-checking for claimable
    /// records (covers backoff windows and claims held by other workers).
    #[serde(with = "duration_secs")]
    pub idle_poll: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_attempts: 3,
            requests_per_second: 2.0,
            fetch_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            db_path: PathBuf::from("docket.db"),
            artifact_dir: PathBuf::from("artifacts"),
            user_agent: format!("docket/{}", env!("CARGO_PKG_VERSION")),
            idle_poll: Duration::from_millis(500),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
