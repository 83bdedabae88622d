//! Tonesync Daemon - background mirroring service
//!
//! Keeps a transcoded mirror of a source media library continuously
//! consistent. The daemon:
//! - validates the environment (ffmpeg present, source root exists)
//! - opens the index database inside the target root
//! - starts a recursive filesystem watch feeding the action queue
//! - runs one startup reconciliation pass in its own cache
//! - drives the drain loop until SIGTERM/SIGINT
//!
//! # Architecture
//!
//! All long-running tasks share a single `CancellationToken` triggered by
//! the signal handler; shutdown is cooperative, and pending index
//! mutations that miss the last flush are re-detected by the next
//! startup's reconciliation pass.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tonesync_core::config::Config;
use tonesync_core::domain::EntryResolver;
use tonesync_core::ports::{IMediaIndex, ITranscoder};
use tonesync_core::queue::ActionQueue;
use tonesync_index::{DatabasePool, IndexCache, SqliteMediaIndex};
use tonesync_sync::process::MediaProcessor;
use tonesync_sync::reconciler::Reconciler;
use tonesync_sync::transcode::FfmpegTranscoder;
use tonesync_sync::watcher::{pump_events, LibraryWatcher};
use tonesync_sync::worker::{MediaWorker, SyncWorker};

/// Mirrors a source media library into a transcoded target library
#[derive(Debug, Parser)]
#[command(name = "tonesyncd", version)]
struct Cli {
    /// Path to the configuration file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!(config_path = %config_path.display(), "Loaded configuration");
    config.validate().context("Invalid configuration")?;

    info!(source = %config.library.source.display(), "Source library");
    info!(target = %config.library.target.display(), "Target library");
    info!(index = %config.index_path().display(), "Index database");

    // Fatal environment checks
    let transcoder = match FfmpegTranscoder::locate() {
        Ok(transcoder) => Arc::new(transcoder) as Arc<dyn ITranscoder>,
        Err(err) => {
            error!(error = %format!("{err:#}"), "ffmpeg is not installed");
            std::process::exit(1);
        }
    };

    if !config.library.source.is_dir() {
        error!(
            source = %config.library.source.display(),
            "Source library does not exist"
        );
        std::process::exit(1);
    }

    tokio::fs::create_dir_all(&config.library.target)
        .await
        .with_context(|| {
            format!(
                "Failed to create target library {}",
                config.library.target.display()
            )
        })?;

    // Resolve roots once so every derived path is absolute
    let source_root = tokio::fs::canonicalize(&config.library.source)
        .await
        .context("Failed to resolve source library path")?;
    let target_root = tokio::fs::canonicalize(&config.library.target)
        .await
        .context("Failed to resolve target library path")?;

    let pool = DatabasePool::new(&config.index_path())
        .await
        .context("Failed to open index database")?;
    let store = Arc::new(SqliteMediaIndex::new(pool.pool().clone())) as Arc<dyn IMediaIndex>;

    let resolver = Arc::new(EntryResolver::new(
        source_root.clone(),
        target_root,
        config.media.conversions.clone(),
    ));
    let queue = Arc::new(ActionQueue::new());

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // Live filesystem watch feeding the queue
    let (mut watcher, events) = LibraryWatcher::new()?;
    watcher.watch(&source_root)?;
    let pump = tokio::spawn(pump_events(
        events,
        Arc::clone(&queue),
        Arc::clone(&resolver),
        config.media.clone(),
        shutdown.clone(),
    ));

    // One-shot startup reconciliation, isolated in its own cache
    let reconciler = Reconciler::new(
        Arc::clone(&store),
        Arc::new(IndexCache::new(Arc::clone(&store))),
        Arc::clone(&queue),
        Arc::clone(&resolver),
        config.media.clone(),
        source_root,
        config.worker.concurrency,
    );
    let sync_worker = SyncWorker::new(reconciler);
    let sync_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { sync_worker.run(shutdown).await }
    });

    // Event-driven drain loop with its own write-back cache
    let cache = Arc::new(IndexCache::new(Arc::clone(&store)));
    let processor = Arc::new(MediaProcessor::new(Arc::clone(&cache), transcoder));
    let worker = MediaWorker::new(
        queue,
        cache,
        processor,
        Duration::from_millis(config.worker.tick_interval_ms),
        config.worker.concurrency,
    );

    worker.run(shutdown.clone()).await;

    // The drain loop only returns on shutdown; collect the helpers
    let _ = sync_task.await;
    let _ = pump.await;
    drop(watcher);

    info!("Tonesync daemon stopped");
    Ok(())
}
