//! Pipeline wiring: registry + limiter + store + one fetcher per worker.

use std::sync::Arc;

use tracing::info;

use super::worker::{WorkerContext, WorkerPool};
use crate::config::PipelineConfig;
use crate::domain::{PipelineError, Seed};
use crate::fetch::HttpFetcher;
use crate::limiter::RateLimiter;
use crate::ports::{ArtifactStore, Fetcher, Registry, RegistryCounts};
use crate::registry::SqliteRegistry;
use crate::store::LocalArtifactStore;

/// The acquisition pipeline.
///
/// Owns the process-wide singletons (registry, rate limiter, artifact
/// store) and spawns the worker pool. All durable progress lives in the
/// registry, so `run` after a crash resumes exactly the unfinished work.
pub struct Pipeline {
    config: PipelineConfig,
    registry: Arc<dyn Registry>,
    store: Arc<dyn ArtifactStore>,
    limiter: Arc<RateLimiter>,
}

impl Pipeline {
    /// Standard wiring: SQLite registry and local artifact store from config.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let registry = Arc::new(SqliteRegistry::open(
            &config.db_path,
            config.max_attempts,
            config.retry.clone(),
        )?);
        let store = Arc::new(LocalArtifactStore::new(config.artifact_dir.clone()));
        Ok(Self::with_parts(config, registry, store))
    }

    /// Wiring seam for tests and alternative backends.
    pub fn with_parts(
        config: PipelineConfig,
        registry: Arc<dyn Registry>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.requests_per_second));
        Self {
            config,
            registry,
            store,
            limiter,
        }
    }

    /// Feed deduplicated seeds into the registry.
    pub async fn ingest(&self, seeds: &[Seed]) -> Result<usize, PipelineError> {
        Ok(self.registry.ingest(seeds).await?)
    }

    /// Progress query for the operational surface.
    pub async fn counts(&self) -> Result<RegistryCounts, PipelineError> {
        Ok(self.registry.counts().await?)
    }

    /// Reconcile stale claims from a previous unclean shutdown, then start
    /// the worker pool with one HTTP fetcher per worker.
    pub async fn start(&self) -> Result<WorkerPool, PipelineError> {
        let mut fetchers: Vec<Arc<dyn Fetcher>> = Vec::with_capacity(self.config.workers);
        for _ in 0..self.config.workers {
            fetchers.push(Arc::new(HttpFetcher::new(&self.config)?));
        }
        self.start_with_fetchers(fetchers).await
    }

    /// `start` with injected fetchers (one worker per fetcher).
    pub async fn start_with_fetchers(
        &self,
        fetchers: Vec<Arc<dyn Fetcher>>,
    ) -> Result<WorkerPool, PipelineError> {
        if fetchers.is_empty() {
            return Err(PipelineError::Config("worker count must be non-zero".into()));
        }

        let reverted = self.registry.reconcile_stale_in_progress().await?;
        let outstanding = self.registry.outstanding().await?;
        info!(
            workers = fetchers.len(),
            reverted, outstanding, "starting acquisition pipeline"
        );

        let ctx = WorkerContext {
            registry: Arc::clone(&self.registry),
            limiter: Arc::clone(&self.limiter),
            store: Arc::clone(&self.store),
            idle_poll: self.config.idle_poll,
        };
        Ok(WorkerPool::spawn(fetchers, ctx))
    }

    /// Run to natural drain and report final counts.
    pub async fn run(&self) -> Result<RegistryCounts, PipelineError> {
        let pool = self.start().await?;
        pool.join().await;
        self.counts().await
    }
}
