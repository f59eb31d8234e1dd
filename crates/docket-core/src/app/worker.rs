//! Worker pool: fixed concurrency, shared limiter, graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::{DocumentRecord, ErrorKind};
use crate::fetch::validate_artifact;
use crate::limiter::RateLimiter;
use crate::ports::{ArtifactStore, Fetcher, Registry};

/// Shared collaborators handed to every worker.
///
/// The registry, limiter, and store are shared by design (each internally
/// synchronized); the fetcher is per-worker and passed separately.
#[derive(Clone)]
pub struct WorkerContext {
    pub registry: Arc<dyn Registry>,
    pub limiter: Arc<RateLimiter>,
    pub store: Arc<dyn ArtifactStore>,

    /// Idle sleep between claim checks while other workers still hold
    /// records or backoff windows have not elapsed.
    pub idle_poll: Duration,
}

/// Handle to a running pool of workers.
///
/// - `request_shutdown` lets each worker finish its in-flight record and
///   stop before the next claim; no record is left uncommitted.
/// - `join` waits for natural drain (no claimable work left anywhere).
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

/// Cloneable trigger for requesting shutdown from another task
/// (e.g. a Ctrl-C handler).
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        // send error just means every worker already exited
        let _ = self.tx.send(true);
    }
}

impl WorkerPool {
    /// Spawn one worker per fetcher. Each worker owns its fetcher exclusively.
    pub fn spawn(fetchers: Vec<Arc<dyn Fetcher>>, ctx: WorkerContext) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(fetchers.len());
        for (worker_id, fetcher) in fetchers.into_iter().enumerate() {
            let ctx = ctx.clone();
            let mut rx = shutdown_rx.clone();
            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, fetcher, ctx, &mut rx).await;
            }));
        }

        Self { shutdown_tx, joins }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Ask all workers to stop after their in-flight record.
    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all workers to exit (natural drain or after shutdown).
    pub async fn join(self) {
        for j in self.joins {
            let _ = j.await;
        }
    }

    /// Request shutdown, then wait.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        self.join().await;
    }
}

async fn worker_loop(
    worker_id: usize,
    fetcher: Arc<dyn Fetcher>,
    ctx: WorkerContext,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    debug!(worker_id, "worker started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let claimed = match ctx.registry.claim_next().await {
            Ok(claimed) => claimed,
            Err(e) => {
                // Registry trouble must not kill the pool; back off and retry.
                error!(worker_id, error = %e, "claim failed");
                tokio::time::sleep(ctx.idle_poll).await;
                continue;
            }
        };

        match claimed {
            Some(record) => {
                // In-flight work always runs to a recorded outcome, even
                // when shutdown is requested mid-fetch.
                process_record(worker_id, &*fetcher, &ctx, &record).await;
            }
            None => {
                match ctx.registry.outstanding().await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => error!(worker_id, error = %e, "outstanding check failed"),
                }
                // Something may become claimable later (backoff window or a
                // claim held by another worker); nap, racing shutdown.
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = tokio::time::sleep(ctx.idle_poll) => {}
                }
            }
        }
    }
    debug!(worker_id, "worker exited");
}

/// Drive one claimed record to a recorded outcome.
async fn process_record(
    worker_id: usize,
    fetcher: &dyn Fetcher,
    ctx: &WorkerContext,
    record: &DocumentRecord,
) {
    ctx.limiter.acquire().await;

    let failure = match fetcher.fetch(&record.source_url, record.kind).await {
        Ok(artifact) => {
            match validate_artifact(&artifact.bytes, artifact.content_type.as_deref()) {
                Ok(()) => match ctx.store.put(record.id, &artifact.bytes).await {
                    Ok(stored) => {
                        info!(
                            worker_id,
                            id = %record.id,
                            size = stored.size,
                            attempt = record.attempts,
                            "stored artifact"
                        );
                        match ctx
                            .registry
                            .record_success(record.id, &stored.path, stored.size, &stored.sha256)
                            .await
                        {
                            Ok(()) => return,
                            Err(e) => {
                                // The claim must still be released or the
                                // pool never drains: fall through to the
                                // failure path, which reverts the record to
                                // claimable. The refetch overwrites the
                                // already-stored artifact.
                                warn!(worker_id, id = %record.id, error = %e, "success write failed; releasing claim");
                                ErrorKind::InvalidArtifact
                            }
                        }
                    }
                    Err(e) => {
                        // Local persistence failure: the bytes never made it
                        // to disk intact, which is retryable.
                        error!(worker_id, id = %record.id, error = %e, "artifact write failed");
                        ErrorKind::InvalidArtifact
                    }
                },
                Err(kind) => kind,
            }
        }
        Err(kind) => kind,
    };

    if let Err(e) = ctx.registry.record_failure(record.id, failure).await {
        error!(worker_id, id = %record.id, error = %e, "failure write failed");
    }
}
