//! Registry port: the single shared mutable resource of the pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{DocId, DocumentRecord, ErrorKind, RegistryError, Seed};

/// Counts by acquisition state, for progress reporting and monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RegistryCounts {
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.downloaded + self.failed + self.skipped
    }
}

/// Persistent record of every known document and its acquisition state.
///
/// Design intent:
/// - The registry owns all state transitions; workers call `claim_next` and
///   then exactly one of `record_success` / `record_failure` per claim.
/// - Every mutation commits immediately; there is no buffered-write mode.
///   Progress is durable after each transition, so the registry itself is
///   the checkpoint and restart needs no extra bookkeeping.
/// - `claim_next` must be race-free: no two concurrent calls may return the
///   same record under any worker count.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Insert new records for seeds not already known by `source_url`.
    /// Returns the number of records actually created.
    async fn ingest(&self, seeds: &[Seed]) -> Result<usize, RegistryError>;

    /// Atomically claim the next eligible record: set it `InProgress` and
    /// count the attempt. Returns `None` when nothing is claimable right now
    /// (which is not the same as the work being finished; see `outstanding`).
    async fn claim_next(&self) -> Result<Option<DocumentRecord>, RegistryError>;

    /// Record a validated, persisted artifact for a claimed record.
    async fn record_success(
        &self,
        id: DocId,
        artifact_path: &str,
        size: u64,
        content_hash: &str,
    ) -> Result<(), RegistryError>;

    /// Record a failed attempt for a claimed record. The registry applies
    /// the retry decision: revert to claimable with backoff, or skip.
    async fn record_failure(&self, id: DocId, error: ErrorKind) -> Result<(), RegistryError>;

    /// Startup reconciliation: revert records left `InProgress` by a dead
    /// worker back to `Pending`. Returns how many were reverted.
    async fn reconcile_stale_in_progress(&self) -> Result<usize, RegistryError>;

    /// Number of records that can still make progress: claimable with budget
    /// remaining, waiting out a backoff delay, or currently claimed.
    /// Workers drain and exit when this reaches zero.
    async fn outstanding(&self) -> Result<usize, RegistryError>;

    /// Counts by state for the operational surface.
    async fn counts(&self) -> Result<RegistryCounts, RegistryError>;

    /// Fetch one record by id.
    async fn get(&self, id: DocId) -> Result<Option<DocumentRecord>, RegistryError>;
}
