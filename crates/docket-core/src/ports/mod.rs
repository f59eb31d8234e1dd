//! Ports: trait seams between the pipeline and its collaborators.
//!
//! - `Registry`: persistent acquisition state (source of truth).
//! - `Fetcher`: one classified network fetch per call.
//! - `ArtifactStore`: downloaded bytes, keyed by record id.

pub mod artifact_store;
pub mod fetcher;
pub mod registry;

pub use self::artifact_store::{ArtifactStore, StoredArtifact};
pub use self::fetcher::{FetchedArtifact, Fetcher};
pub use self::registry::{Registry, RegistryCounts};
