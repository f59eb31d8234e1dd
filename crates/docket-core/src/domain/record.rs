//! Document record: the unit of acquisition work.

use chrono::{DateTime, Utc};

use super::error::ErrorKind;
use super::ids::DocId;
use super::kind::DocKind;
use super::state::AcquireState;

/// One row per discoverable document.
///
/// Design:
/// - The registry is the single source of truth for these; workers only ever
///   see owned snapshots handed out by `claim_next`.
/// - `id` and `source_url` are immutable after creation.
/// - `artifact_path` is set if and only if `state == Downloaded`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: DocId,
    pub source_url: String,
    pub kind: DocKind,
    pub state: AcquireState,

    /// Number of fetch attempts so far, including the one a claim starts.
    /// Monotonically non-decreasing across the record's lifetime.
    pub attempts: u32,

    /// Classification of the most recent failure, kept for audit.
    pub last_error: Option<ErrorKind>,

    /// Where the validated artifact landed (Downloaded only).
    pub artifact_path: Option<String>,

    /// Size of the stored artifact in bytes (Downloaded only).
    pub artifact_size: Option<u64>,

    /// SHA-256 of the stored artifact (Downloaded only).
    pub content_hash: Option<String>,

    /// Earliest time the next retry may be claimed (Failed only).
    pub next_retry_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    /// Timestamp of the last state mutation; claims are served oldest-first
    /// on this column so resumed runs pick up where they left off.
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Build a fresh pending record for an ingested seed.
    pub fn new(source_url: impl Into<String>, kind: DocKind) -> Self {
        let now = Utc::now();
        Self {
            id: DocId::new(),
            source_url: source_url.into(),
            kind,
            state: AcquireState::Pending,
            attempts: 0,
            last_error: None,
            artifact_path: None,
            artifact_size: None,
            content_hash: None,
            next_retry_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Ingestion input: one `(source_url, kind)` pair.
///
/// Produced by the registry-population collaborator; deduplicated by
/// `source_url` before record creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub source_url: String,
    pub kind: DocKind,
}

impl Seed {
    /// Build a seed, classifying the kind from the URL shape.
    pub fn from_url(url: impl Into<String>) -> Self {
        let source_url = url.into();
        let kind = DocKind::classify(&source_url);
        Self { source_url, kind }
    }
}
