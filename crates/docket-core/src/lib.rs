//! docket-core
//!
//! Rate-limited concurrent acquisition pipeline for externally hosted legal
//! documents, with checkpointed, idempotent resume.
//!
//! Module map:
//! - **domain**: record shape, states, error taxonomy, retry decision
//! - **ports**: trait seams (`Registry`, `Fetcher`, `ArtifactStore`)
//! - **registry**: SQLite source of truth for acquisition state
//! - **fetch**: HTTP client, artifact discovery, validation gate
//! - **store**: local filesystem artifact store keyed by record id
//! - **limiter**: process-wide fixed-interval request gate
//! - **app**: worker pool and pipeline wiring
//!
//! All durable progress lives in the registry and commits per record, so
//! the registry itself is the checkpoint: stopping the process (cleanly or
//! not) and starting again resumes exactly the unfinished work.

pub mod app;
pub mod config;
pub mod domain;
pub mod fetch;
pub mod limiter;
pub mod ports;
pub mod registry;
pub mod store;

pub use app::{Pipeline, ShutdownHandle, WorkerPool};
pub use config::PipelineConfig;
pub use domain::{AcquireState, DocId, DocKind, DocumentRecord, ErrorKind, RetryPolicy, Seed};
pub use limiter::RateLimiter;
pub use ports::{ArtifactStore, Fetcher, Registry, RegistryCounts};
pub use registry::SqliteRegistry;
pub use store::LocalArtifactStore;
