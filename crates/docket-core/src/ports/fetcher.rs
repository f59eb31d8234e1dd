//! Fetcher port: one network fetch, classified.

use async_trait::async_trait;

use crate::domain::{DocKind, ErrorKind};

/// Raw bytes plus content-type classification from a completed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Performs exactly one acquisition fetch for a document and classifies the
/// outcome. Implementations must not touch the registry; their only side
/// effect is the network call itself.
///
/// Each worker owns its own fetcher instance (and with it a dedicated pooled
/// connection); fetchers are never shared across workers.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the artifact for `source_url`.
    ///
    /// `DirectPdf` sources are fetched as-is. `FullDocument` sources fetch
    /// the HTML page, discover the embedded artifact reference, then fetch
    /// that artifact.
    async fn fetch(&self, source_url: &str, kind: DocKind)
        -> Result<FetchedArtifact, ErrorKind>;
}
