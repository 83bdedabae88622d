//! Tonesync Sync - reconciliation and drain-loop engine
//!
//! Keeps the mirrored library consistent with the source library:
//!
//! - [`watcher`] - notify-based filesystem watch feeding the action queue
//! - [`walk`] - recursive media-file enumeration of the source tree
//! - [`reconciler`] - index↔filesystem comparison emitting corrective actions
//! - [`process`] - the per-item processing step (transcode/copy/delete + index upsert)
//! - [`worker`] - the event-driven drain loop and the one-shot sync worker
//! - [`transcode`] - ffmpeg adapter for the `ITranscoder` port
//!
//! ## Data Flow
//!
//! ```text
//! notify events ──→ LibraryWatcher ──→ mpsc ──→ pump_events ──┐
//!                                                             ▼
//! startup ──→ SyncWorker ──→ Reconciler ─────────────→  ActionQueue
//!                                                             │
//!                                                             ▼
//!                                      MediaWorker drain ──→ MediaProcessor
//!                                                             │
//!                                                             ▼
//!                                                  IndexCache ──→ SQLite
//! ```

pub mod process;
pub mod reconciler;
pub mod transcode;
pub mod walk;
pub mod watcher;
pub mod worker;

use thiserror::Error;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation was interrupted by the shutdown signal
    #[error("Operation cancelled")]
    Cancelled,

    /// A domain-level error propagated from tonesync-core
    #[error("Domain error: {0}")]
    Domain(#[from] tonesync_core::domain::DomainError),
}
