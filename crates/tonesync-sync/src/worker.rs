//! The two background workers
//!
//! [`MediaWorker`] is the event-driven drain loop: on each timer tick it
//! snapshots the queue length and consumes that many items concurrently,
//! flushing the write-back cache as it goes and fully committing at the
//! end of the batch (`Idle ⇄ Draining`).
//!
//! [`SyncWorker`] runs the reconciler once at startup inside its own
//! cache so its reads share no in-flight state with the drain loop beyond
//! the queue and the persistent store. It is terminal after one pass; a
//! timer re-arm for drift correction would slot in here without touching
//! the queue or reconciler contracts.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use tonesync_core::queue::ActionQueue;
use tonesync_index::IndexCache;

use crate::process::MediaProcessor;
use crate::reconciler::Reconciler;

/// Tick-driven drain loop over the action queue
pub struct MediaWorker {
    queue: Arc<ActionQueue>,
    cache: Arc<IndexCache>,
    processor: Arc<MediaProcessor>,
    tick_interval: Duration,
    concurrency: usize,
}

impl MediaWorker {
    pub fn new(
        queue: Arc<ActionQueue>,
        cache: Arc<IndexCache>,
        processor: Arc<MediaProcessor>,
        tick_interval: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            queue,
            cache,
            processor,
            tick_interval,
            concurrency,
        }
    }

    /// Main loop: wait for a tick, drain if there is work, repeat until
    /// the shutdown signal fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            "Media worker started"
        );

        let mut ticker = tokio::time::interval(self.tick_interval);
        // A drain outlasting the interval should not cause a burst of
        // immediate catch-up ticks.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.queue.is_empty().await {
                tokio::task::yield_now().await;
                continue;
            }

            let pending = self.queue.len().await;
            info!(pending, "Draining action queue");

            if let Err(err) = self.drain(pending, &cancel).await {
                error!(
                    error = %format!("{err:#}"),
                    "Drain cycle failed; pending index changes kept for retry"
                );
            }
        }

        info!("Media worker stopped");
    }

    /// Consumes up to `batch` items concurrently and commits the results.
    ///
    /// Each task pops one item, runs the processing step (which absorbs
    /// its own per-file failures) and flushes the cache without dropping
    /// it. After the whole batch, one final flush drops the cache to
    /// release its memory. A flush failure aborts the cycle before that
    /// final commit so every pending mutation survives for the next tick.
    pub async fn drain(&self, batch: usize, cancel: &CancellationToken) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(batch);

        for _ in 0..batch {
            let semaphore = Arc::clone(&semaphore);
            let queue = Arc::clone(&self.queue);
            let cache = Arc::clone(&self.cache);
            let processor = Arc::clone(&self.processor);
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return Ok(());
                };
                if cancel.is_cancelled() {
                    return Ok(());
                }

                // The snapshot raced other consumers; an empty pop is fine.
                if let Some(item) = queue.dequeue().await {
                    processor.process(&item, &cancel).await;
                }

                cache.flush(false).await
            }));
        }

        let mut failure: Option<anyhow::Error> = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    let _ = failure.get_or_insert(err);
                }
                Err(join_err) => {
                    let _ = failure.get_or_insert(anyhow::Error::from(join_err));
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        self.cache.flush(true).await
    }
}

/// One-shot startup reconciliation worker
pub struct SyncWorker {
    reconciler: Reconciler,
}

impl SyncWorker {
    pub fn new(reconciler: Reconciler) -> Self {
        Self { reconciler }
    }

    /// Runs one full reconciliation pass, then terminates.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Synchronization worker started");

        self.reconciler.reconcile(&cancel).await;

        info!("Synchronization worker finished");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tonesync_core::ports::ITranscoder;
    use tonesync_index::{DatabasePool, SqliteMediaIndex};

    use super::*;

    struct NoopTranscoder;

    #[async_trait::async_trait]
    impl ITranscoder for NoopTranscoder {
        async fn convert(
            &self,
            _source: &std::path::Path,
            _target: &std::path::Path,
            _cancel: &CancellationToken,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_exits_promptly_on_cancellation() {
        let pool = DatabasePool::in_memory().await.unwrap();
        let index = Arc::new(SqliteMediaIndex::new(pool.pool().clone()));
        let cache = Arc::new(IndexCache::new(index));
        let queue = Arc::new(ActionQueue::new());
        let processor = Arc::new(MediaProcessor::new(
            Arc::clone(&cache),
            Arc::new(NoopTranscoder),
        ));

        let worker = MediaWorker::new(queue, cache, processor, Duration::from_millis(10), 2);

        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(2), worker.run(cancel))
            .await
            .expect("Worker should stop when the token is cancelled");
    }
}
