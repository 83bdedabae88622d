//! The per-item processing step
//!
//! Executes one dequeued `(entry, action)` pair: creating (transcoding or
//! copying) the mirror file and upserting its index record, or deleting
//! the mirror file and removing its record. Failures here are transient
//! per-file errors: they are caught at this boundary, logged with the
//! paths involved, and never abort the rest of a drain batch.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use tonesync_core::domain::{FileAction, IndexRecord, MediaEntry};
use tonesync_core::ports::ITranscoder;
use tonesync_core::queue::QueueItem;
use tonesync_index::IndexCache;

/// Runs the processing step against the write-back cache and the transcoder
pub struct MediaProcessor {
    cache: Arc<IndexCache>,
    transcoder: Arc<dyn ITranscoder>,
}

impl MediaProcessor {
    pub fn new(cache: Arc<IndexCache>, transcoder: Arc<dyn ITranscoder>) -> Self {
        Self { cache, transcoder }
    }

    /// Processes one queue item, absorbing per-file failures.
    pub async fn process(&self, item: &QueueItem, cancel: &CancellationToken) {
        info!(
            source = %item.entry.absolute_source().display(),
            action = ?item.action,
            "Processing"
        );

        let result = match item.action {
            FileAction::Create => self.create(&item.entry, cancel).await,
            FileAction::Delete => self.delete(&item.entry).await,
        };

        if let Err(err) = result {
            error!(
                source = %item.entry.absolute_source().display(),
                error = %format!("{err:#}"),
                "Failed to process file"
            );
        }
    }

    /// (Re)creates the mirror of `entry`.
    ///
    /// Skips when the index timestamp is at least the source mtime - the
    /// guard against duplicate or late-arriving events. Otherwise the
    /// target directory is created, the file is transcoded (or copied when
    /// no conversion applies) and the record is upserted with the current
    /// time, reusing the existing record's target path when one exists.
    async fn create(&self, entry: &MediaEntry, cancel: &CancellationToken) -> Result<()> {
        let record = self.cache.get(entry.relative_source()).await?;
        let modified = source_modified_at(entry.absolute_source()).await?;

        if let Some(ref existing) = record {
            if existing.processed_at >= modified {
                info!(
                    source = %entry.absolute_source().display(),
                    "Skipped - file is not modified"
                );
                return Ok(());
            }
        }

        if let Some(parent) = entry.absolute_target().parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create target directory {}", parent.display())
            })?;
        }

        if entry.requires_conversion() {
            self.transcoder
                .convert(entry.absolute_source(), entry.absolute_target(), cancel)
                .await?;
            info!(
                target = %entry.absolute_target().display(),
                "Converted"
            );
        } else {
            tokio::fs::copy(entry.absolute_source(), entry.absolute_target())
                .await
                .with_context(|| {
                    format!("Failed to copy to {}", entry.absolute_target().display())
                })?;
            info!(
                target = %entry.absolute_target().display(),
                "Copied"
            );
        }

        let updated = match record {
            Some(existing) => existing.touched(Utc::now()),
            None => IndexRecord::for_entry(entry, Utc::now()),
        };
        self.cache.set(updated).await?;

        Ok(())
    }

    /// Deletes the mirror of `entry` and drops its index record.
    ///
    /// An already-absent target counts as satisfied; the record removal
    /// still happens so the index converges.
    async fn delete(&self, entry: &MediaEntry) -> Result<()> {
        let record = self.cache.get(entry.relative_source()).await?;

        if matches!(
            tokio::fs::try_exists(entry.absolute_target()).await,
            Ok(true)
        ) {
            tokio::fs::remove_file(entry.absolute_target())
                .await
                .with_context(|| {
                    format!("Failed to delete {}", entry.absolute_target().display())
                })?;
            info!(
                target = %entry.absolute_target().display(),
                "Deleted"
            );
        } else {
            info!(
                target = %entry.absolute_target().display(),
                "Skipped - already deleted"
            );
        }

        if let Some(existing) = record {
            self.cache.remove(&existing).await;
        }

        Ok(())
    }
}

/// Reads the UTC last-modified time of the absolute source path.
///
/// Always resolved from the absolute path so the comparison against the
/// index timestamp is meaningful regardless of the working directory.
pub(crate) async fn source_modified_at(path: &Path) -> Result<DateTime<Utc>> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    let modified = metadata
        .modified()
        .with_context(|| format!("No modification time for {}", path.display()))?;

    Ok(DateTime::<Utc>::from(modified))
}
