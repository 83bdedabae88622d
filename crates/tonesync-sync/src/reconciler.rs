//! Index ↔ filesystem reconciliation
//!
//! Compares the live source tree and the persisted index against each
//! other and the target tree, enqueueing a corrective action for every
//! discrepancy. Two passes run in sequence, each fault-isolated so a
//! failure in one does not abort the other:
//!
//! 1. **Index → filesystem**: every persisted record whose source file no
//!    longer exists schedules a `Delete` of its mirror.
//! 2. **Filesystem → index**: every media file in the source tree is put
//!    through the freshness decision (untracked / target missing / stale
//!    → `Create`; otherwise up to date).
//!
//! Both passes only enqueue; persistence goes through the write-back
//! cache. Per-file checks fan out concurrently, bounded by a semaphore.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tonesync_core::config::MediaConfig;
use tonesync_core::domain::{EntryResolver, FileAction};
use tonesync_core::ports::IMediaIndex;
use tonesync_core::queue::ActionQueue;
use tonesync_index::IndexCache;

use crate::process::source_modified_at;
use crate::walk::collect_media_files;

/// Emits corrective actions for every divergence between source tree,
/// target tree and persisted index
pub struct Reconciler {
    index: Arc<dyn IMediaIndex>,
    cache: Arc<IndexCache>,
    queue: Arc<ActionQueue>,
    resolver: Arc<EntryResolver>,
    media: MediaConfig,
    source_root: PathBuf,
    concurrency: usize,
}

impl Reconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: Arc<dyn IMediaIndex>,
        cache: Arc<IndexCache>,
        queue: Arc<ActionQueue>,
        resolver: Arc<EntryResolver>,
        media: MediaConfig,
        source_root: PathBuf,
        concurrency: usize,
    ) -> Self {
        Self {
            index,
            cache,
            queue,
            resolver,
            media,
            source_root,
            concurrency,
        }
    }

    /// Runs both reconciliation passes.
    ///
    /// Failures are logged, not returned: reconciliation is best-effort
    /// and the drain loop remains functional either way.
    pub async fn reconcile(&self, cancel: &CancellationToken) {
        info!("Synchronizing media library");

        if let Err(err) = self.reconcile_index(cancel).await {
            error!(
                error = %format!("{err:#}"),
                "Failed to reconcile persisted index against source tree"
            );
        }

        if let Err(err) = self.reconcile_source(cancel).await {
            error!(
                error = %format!("{err:#}"),
                "Failed to reconcile source tree against index"
            );
        }
    }

    /// Pass 1: schedule deletion of mirrors whose source file is gone.
    async fn reconcile_index(&self, cancel: &CancellationToken) -> Result<()> {
        let records = self.index.list_all().await?;
        debug!(
            count = records.len(),
            "Checking persisted records against source tree"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(records.len());

        for record in records {
            if cancel.is_cancelled() {
                break;
            }

            let entry = self.resolver.resolve_record(&record);
            let semaphore = Arc::clone(&semaphore);
            let queue = Arc::clone(&self.queue);

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };

                // An unreadable source counts as missing: the mirror must
                // not outlive a file we can no longer see.
                let present = matches!(
                    tokio::fs::try_exists(entry.absolute_source()).await,
                    Ok(true)
                );
                if !present {
                    info!(
                        source = %entry.relative_source(),
                        target = %entry.relative_target(),
                        "Mirror scheduled for deletion - source file not found"
                    );
                    queue.enqueue(entry, FileAction::Delete).await;
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        Ok(())
    }

    /// Pass 2: apply the freshness decision to every source media file.
    async fn reconcile_source(&self, cancel: &CancellationToken) -> Result<()> {
        let files = collect_media_files(&self.source_root, &self.media, cancel).await?;
        debug!(count = files.len(), "Checking source files against index");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(files.len());

        for file in files {
            if cancel.is_cancelled() {
                break;
            }

            let semaphore = Arc::clone(&semaphore);
            let resolver = Arc::clone(&self.resolver);
            let cache = Arc::clone(&self.cache);
            let queue = Arc::clone(&self.queue);

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };

                if let Err(err) = decide_file(&file, &resolver, &cache, &queue).await {
                    warn!(
                        file = %file.display(),
                        error = %format!("{err:#}"),
                        "Failed to evaluate file"
                    );
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        Ok(())
    }
}

/// The freshness decision for one source file.
async fn decide_file(
    file: &std::path::Path,
    resolver: &EntryResolver,
    cache: &IndexCache,
    queue: &ActionQueue,
) -> Result<()> {
    let entry = resolver.resolve_path(file)?;

    let Some(record) = cache.get(entry.relative_source()).await? else {
        info!(
            source = %entry.relative_source(),
            "File scheduled for creation - not yet tracked"
        );
        queue.enqueue(entry, FileAction::Create).await;
        return Ok(());
    };

    // The recorded target path is authoritative for an already-tracked
    // file, even if the conversion map has changed since.
    let tracked = resolver.resolve_record(&record);

    let target_present = matches!(
        tokio::fs::try_exists(tracked.absolute_target()).await,
        Ok(true)
    );
    if !target_present {
        info!(
            source = %tracked.relative_source(),
            target = %tracked.relative_target(),
            "File scheduled for creation - target missing"
        );
        queue.enqueue(tracked, FileAction::Create).await;
        return Ok(());
    }

    let modified = source_modified_at(tracked.absolute_source()).await?;
    if record.processed_at < modified {
        info!(
            source = %tracked.relative_source(),
            "File scheduled for creation - source modified"
        );
        queue.enqueue(tracked, FileAction::Create).await;
    }

    Ok(())
}
