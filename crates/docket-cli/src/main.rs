//! docket: acquire a seed list of document URLs under a rate ceiling.
//!
//! Usage:
//!   docket-cli <seeds-file> [--db <path>] [--artifacts <dir>]
//!             [--workers <n>] [--rps <n>] [--max-attempts <n>]
//!
//! The seeds file holds one URL per line; blank lines and `#` comments are
//! ignored. Re-running with the same seeds is idempotent: known URLs are
//! skipped at ingestion and finished records are never re-fetched.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use docket_core::{Pipeline, PipelineConfig, Seed};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn usage() -> ! {
    eprintln!(
        "usage: docket-cli <seeds-file> [--db <path>] [--artifacts <dir>] \
         [--workers <n>] [--rps <n>] [--max-attempts <n>]"
    );
    std::process::exit(2);
}

fn parse_args() -> (PathBuf, PipelineConfig) {
    let mut config = PipelineConfig::default();
    let mut seeds_path: Option<PathBuf> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |name: &str| args.next().unwrap_or_else(|| {
            eprintln!("missing value for {name}");
            usage()
        });
        match arg.as_str() {
            "--db" => config.db_path = PathBuf::from(value("--db")),
            "--artifacts" => config.artifact_dir = PathBuf::from(value("--artifacts")),
            "--workers" => {
                config.workers = value("--workers").parse().unwrap_or_else(|_| usage())
            }
            "--rps" => {
                config.requests_per_second =
                    value("--rps").parse().unwrap_or_else(|_| usage())
            }
            "--max-attempts" => {
                config.max_attempts =
                    value("--max-attempts").parse().unwrap_or_else(|_| usage())
            }
            "--help" | "-h" => usage(),
            _ if seeds_path.is_none() && !arg.starts_with('-') => {
                seeds_path = Some(PathBuf::from(arg))
            }
            _ => usage(),
        }
    }

    match seeds_path {
        Some(path) => (path, config),
        None => usage(),
    }
}

fn parse_seeds(text: &str) -> Vec<Seed> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(Seed::from_url)
        .collect()
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (seeds_path, config) = parse_args();

    let text = match tokio::fs::read_to_string(&seeds_path).await {
        Ok(text) => text,
        Err(e) => {
            error!(path = %seeds_path.display(), error = %e, "cannot read seeds file");
            return ExitCode::FAILURE;
        }
    };
    let seeds = parse_seeds(&text);

    let pipeline = match Pipeline::new(config) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            error!(error = %e, "pipeline setup failed");
            return ExitCode::FAILURE;
        }
    };

    match pipeline.ingest(&seeds).await {
        Ok(created) => info!(seeds = seeds.len(), created, "seeds ingested"),
        Err(e) => {
            error!(error = %e, "ingestion failed");
            return ExitCode::FAILURE;
        }
    }

    let pool = match pipeline.start().await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "pipeline start failed");
            return ExitCode::FAILURE;
        }
    };

    // Ctrl-C requests a graceful stop: in-flight fetches finish and commit,
    // nothing is left claimed for the next run.
    let shutdown = pool.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("stop requested; letting in-flight fetches finish");
            shutdown.trigger();
        }
    });

    // Periodic progress line while the pool drains.
    let progress = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(30)).await;
                if let Ok(c) = pipeline.counts().await {
                    info!(
                        pending = c.pending,
                        in_progress = c.in_progress,
                        downloaded = c.downloaded,
                        failed = c.failed,
                        skipped = c.skipped,
                        "progress"
                    );
                }
            }
        })
    };

    pool.join().await;
    progress.abort();

    match pipeline.counts().await {
        Ok(counts) => {
            info!(
                pending = counts.pending,
                downloaded = counts.downloaded,
                failed = counts.failed,
                skipped = counts.skipped,
                "run finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "final counts query failed");
            ExitCode::FAILURE
        }
    }
}
