//! Artifact store port: durable home for downloaded bytes.

use async_trait::async_trait;

use crate::domain::DocId;

/// Where a stored artifact landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

/// Content store keyed by record id.
///
/// Downstream metadata-extraction collaborators read from this store by id,
/// never by URL.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist validated artifact bytes for `id`.
    async fn put(&self, id: DocId, bytes: &[u8]) -> Result<StoredArtifact, std::io::Error>;
}
