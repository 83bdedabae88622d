//! Persistent index port (driven/secondary port)
//!
//! One logical table keyed by relative source path. The write-back cache
//! in `tonesync-index` is the only caller: reads happen on cache misses,
//! writes happen exclusively through [`IMediaIndex::apply`] at flush time
//! so that a batch of pending mutations commits as one unit.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific and
//!   don't need domain-level classification.
//! - `list_all` materializes the table; index sizes are music libraries,
//!   not object stores.

use async_trait::async_trait;

use crate::domain::IndexRecord;

/// One deferred write, applied at flush time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexMutation {
    /// Insert a record that does not yet exist in the store
    Insert(IndexRecord),
    /// Replace an existing record
    Update(IndexRecord),
    /// Remove the record for the given source path
    Delete(String),
}

/// Keyed record store for per-file mirror state
#[async_trait]
pub trait IMediaIndex: Send + Sync {
    /// Point lookup by source path.
    async fn get(&self, source_path: &str) -> anyhow::Result<Option<IndexRecord>>;

    /// Existence check by source path.
    async fn exists(&self, source_path: &str) -> anyhow::Result<bool>;

    /// Insert or replace a single record.
    async fn upsert(&self, record: &IndexRecord) -> anyhow::Result<()>;

    /// Delete the record for a source path. Deleting an absent key is not
    /// an error.
    async fn delete(&self, source_path: &str) -> anyhow::Result<()>;

    /// Enumerate every persisted record.
    async fn list_all(&self) -> anyhow::Result<Vec<IndexRecord>>;

    /// Apply a batch of mutations as a single commit.
    ///
    /// Either every mutation in the batch becomes durable or none does;
    /// the write-back cache relies on this to keep its pending states
    /// retryable after a failed flush.
    async fn apply(&self, mutations: &[IndexMutation]) -> anyhow::Result<()>;
}
