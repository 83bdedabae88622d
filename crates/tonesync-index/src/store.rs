//! SQLite implementation of IMediaIndex
//!
//! Concrete adapter for the persistent index port. One logical table,
//! `media_entries`, keyed by relative source path.
//!
//! ## Type Mapping
//!
//! | Domain field  | SQL column   | Strategy                           |
//! |---------------|--------------|------------------------------------|
//! | source_path   | TEXT (PK)    | UTF-8 relative path string         |
//! | target_path   | TEXT         | UTF-8 relative path string         |
//! | processed_at  | TEXT         | ISO 8601 via `to_rfc3339()`        |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use tonesync_core::domain::IndexRecord;
use tonesync_core::ports::{IMediaIndex, IndexMutation};

use crate::IndexError;

/// SQLite-based implementation of the media index port
///
/// All operations go through a connection pool; `apply` wraps its batch in
/// a single transaction so a flush commits atomically.
pub struct SqliteMediaIndex {
    pool: SqlitePool,
}

impl SqliteMediaIndex {
    /// Creates a new index instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, IndexError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| IndexError::DecodeError(format!("Failed to parse datetime '{}': {}", s, e)))
}

/// Reconstruct an IndexRecord from a database row
fn record_from_row(row: &SqliteRow) -> Result<IndexRecord, IndexError> {
    let source_path: String = row.get("source_path");
    let target_path: String = row.get("target_path");
    let processed_at_str: String = row.get("processed_at");

    Ok(IndexRecord {
        source_path,
        target_path,
        processed_at: parse_datetime(&processed_at_str)?,
    })
}

#[async_trait]
impl IMediaIndex for SqliteMediaIndex {
    async fn get(&self, source_path: &str) -> anyhow::Result<Option<IndexRecord>> {
        let row = sqlx::query("SELECT * FROM media_entries WHERE source_path = ?")
            .bind(source_path)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(record_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn exists(&self, source_path: &str) -> anyhow::Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM media_entries WHERE source_path = ?")
                .bind(source_path)
                .fetch_one(&self.pool)
                .await?;

        Ok(count > 0)
    }

    async fn upsert(&self, record: &IndexRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO media_entries \
             (source_path, target_path, processed_at) \
             VALUES (?, ?, ?)",
        )
        .bind(&record.source_path)
        .bind(&record.target_path)
        .bind(record.processed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::trace!(source_path = %record.source_path, "Upserted index record");
        Ok(())
    }

    async fn delete(&self, source_path: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM media_entries WHERE source_path = ?")
            .bind(source_path)
            .execute(&self.pool)
            .await?;

        tracing::trace!(source_path = %source_path, "Deleted index record");
        Ok(())
    }

    async fn list_all(&self) -> anyhow::Result<Vec<IndexRecord>> {
        let rows = sqlx::query("SELECT * FROM media_entries ORDER BY source_path ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(record_from_row(row)?);
        }

        Ok(records)
    }

    async fn apply(&self, mutations: &[IndexMutation]) -> anyhow::Result<()> {
        if mutations.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for mutation in mutations {
            match mutation {
                IndexMutation::Insert(record) | IndexMutation::Update(record) => {
                    // Insert and update share the upsert statement; the
                    // distinction only matters to the cache's bookkeeping.
                    sqlx::query(
                        "INSERT OR REPLACE INTO media_entries \
                         (source_path, target_path, processed_at) \
                         VALUES (?, ?, ?)",
                    )
                    .bind(&record.source_path)
                    .bind(&record.target_path)
                    .bind(record.processed_at.to_rfc3339())
                    .execute(&mut *tx)
                    .await?;
                }
                IndexMutation::Delete(source_path) => {
                    sqlx::query("DELETE FROM media_entries WHERE source_path = ?")
                        .bind(source_path)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;

        tracing::trace!(count = mutations.len(), "Applied index mutation batch");
        Ok(())
    }
}
