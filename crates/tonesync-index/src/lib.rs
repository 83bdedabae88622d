//! Tonesync Index - persistent per-file state
//!
//! SQLite-backed implementation of the `IMediaIndex` port plus the
//! write-back cache layered over it.
//!
//! ## Architecture
//!
//! ```text
//! processing step / reconciler
//!          │
//!          ▼
//!     IndexCache  (in-memory overlay, deferred batched commit)
//!          │ flush / cache-miss read
//!          ▼
//!   SqliteMediaIndex  (IMediaIndex adapter)
//!          │
//!          ▼
//!      DatabasePool  (WAL, embedded migration)
//! ```
//!
//! The cache is the single source of truth for uncommitted mutations;
//! nothing else in the engine talks to the store directly for writes.

pub mod cache;
pub mod pool;
pub mod store;

pub use cache::{CacheState, IndexCache};
pub use pool::DatabasePool;
pub use store::SqliteMediaIndex;

/// Errors that can occur inside the index adapter
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be decoded into a domain type
    #[error("Decode error: {0}")]
    DecodeError(String),
}

impl From<sqlx::Error> for IndexError {
    fn from(e: sqlx::Error) -> Self {
        IndexError::QueryFailed(e.to_string())
    }
}
