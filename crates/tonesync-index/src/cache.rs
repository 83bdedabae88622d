//! Write-back cache over the persistent index
//!
//! In-memory overlay that absorbs index reads and defers writes, so a
//! drain cycle touching dozens of files commits its index changes in one
//! batch instead of one transaction per file.
//!
//! Every record read or written during a processing session passes through
//! exactly one [`CacheRecord`], keyed by relative source path. Pending
//! mutations are tagged with a [`CacheState`] and matched exhaustively at
//! flush time; the cache is the single source of truth for uncommitted
//! changes, and nothing else writes to the store.
//!
//! All four operations serialize on one mutex, acquired for the duration
//! of the operation (including the store probe on a cache miss) and
//! released on every exit path by the guard.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use tonesync_core::domain::IndexRecord;
use tonesync_core::ports::{IMediaIndex, IndexMutation};

/// Lifecycle state of a cached record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Mirrors the store; nothing to write at flush time
    Unchanged,
    /// Not yet in the store; flush will insert it
    PendingInsert,
    /// Exists in the store with different content; flush will replace it
    PendingUpdate,
    /// Flush will delete it from the store and evict it from the cache
    PendingDelete,
}

/// A cached record plus its pending-mutation state
#[derive(Debug, Clone)]
struct CacheRecord {
    state: CacheState,
    record: IndexRecord,
}

/// Write-back overlay over an [`IMediaIndex`]
///
/// The most recent `set`/`remove` for a key wins; a key never has more
/// than one cache record at a time.
pub struct IndexCache {
    index: Arc<dyn IMediaIndex>,
    inner: Mutex<HashMap<String, CacheRecord>>,
}

impl IndexCache {
    pub fn new(index: Arc<dyn IMediaIndex>) -> Self {
        Self {
            index,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the record for `source_path`.
    ///
    /// Serves from the cache when present (whatever its pending state);
    /// otherwise falls back to the store and caches a hit as `Unchanged`.
    /// This fallback is the only read path to the store.
    pub async fn get(&self, source_path: &str) -> anyhow::Result<Option<IndexRecord>> {
        let mut inner = self.inner.lock().await;

        if let Some(cached) = inner.get(source_path) {
            return Ok(Some(cached.record.clone()));
        }

        match self.index.get(source_path).await? {
            Some(record) => {
                inner.insert(
                    source_path.to_string(),
                    CacheRecord {
                        state: CacheState::Unchanged,
                        record: record.clone(),
                    },
                );
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Stage `record` for write-back.
    ///
    /// If the key is already cached, the stored record is replaced in
    /// place; an `Unchanged` entry becomes `PendingUpdate` so the write is
    /// not lost at flush time, while an already-pending state is kept. If
    /// the key is not cached, the store is probed to decide between
    /// `PendingInsert` and `PendingUpdate`.
    pub async fn set(&self, record: IndexRecord) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;

        if let Some(cached) = inner.get_mut(&record.source_path) {
            cached.record = record;
            if cached.state == CacheState::Unchanged {
                cached.state = CacheState::PendingUpdate;
            }
            return Ok(());
        }

        let state = if self.index.exists(&record.source_path).await? {
            CacheState::PendingUpdate
        } else {
            CacheState::PendingInsert
        };

        inner.insert(
            record.source_path.clone(),
            CacheRecord { state, record },
        );
        Ok(())
    }

    /// Stage deletion of `record`'s key.
    ///
    /// Unconditionally marks the entry `PendingDelete`, overwriting any
    /// prior state, even when the key was never read into the cache.
    pub async fn remove(&self, record: &IndexRecord) {
        let mut inner = self.inner.lock().await;

        inner.insert(
            record.source_path.clone(),
            CacheRecord {
                state: CacheState::PendingDelete,
                record: record.clone(),
            },
        );
    }

    /// Apply all pending mutations to the store as one batch.
    ///
    /// On success, deleted keys are evicted and surviving entries settle
    /// to `Unchanged`; with `drop_all` the whole cache is cleared instead,
    /// releasing its memory. On failure every pending state is left
    /// untouched, so the next flush retries the full batch - a failed
    /// commit must never masquerade as success.
    pub async fn flush(&self, drop_all: bool) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;

        let mut mutations = Vec::new();
        for (source_path, cached) in inner.iter() {
            match cached.state {
                CacheState::Unchanged => {}
                CacheState::PendingInsert => {
                    mutations.push(IndexMutation::Insert(cached.record.clone()));
                }
                CacheState::PendingUpdate => {
                    mutations.push(IndexMutation::Update(cached.record.clone()));
                }
                CacheState::PendingDelete => {
                    mutations.push(IndexMutation::Delete(source_path.clone()));
                }
            }
        }

        if !mutations.is_empty() {
            self.index.apply(&mutations).await?;
            debug!(count = mutations.len(), "Flushed pending index mutations");
        }

        if drop_all {
            inner.clear();
        } else {
            inner.retain(|_, cached| cached.state != CacheState::PendingDelete);
            for cached in inner.values_mut() {
                cached.state = CacheState::Unchanged;
            }
        }

        Ok(())
    }

    /// Number of currently cached keys (pending or unchanged).
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether the cache holds no entries at all.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// The pending state for a key, if cached. Test and diagnostic hook.
    pub async fn state_of(&self, source_path: &str) -> Option<CacheState> {
        self.inner
            .lock()
            .await
            .get(source_path)
            .map(|cached| cached.state)
    }
}
