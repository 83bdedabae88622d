//! Live filesystem watch over the source library
//!
//! Wraps the `notify` crate to monitor the source root recursively,
//! converting raw OS events into [`LibraryEvent`] values delivered over an
//! mpsc channel. A separate pump task ([`pump_events`]) translates those
//! into queue actions; redundant notifications (a create immediately
//! followed by a change, a scan racing a watcher event) are absorbed by
//! the queue's deduplication, so no debouncing happens here.
//!
//! ## Architecture
//!
//! ```text
//! inotify / kqueue
//!       │
//!       ▼
//!  LibraryWatcher ──→ mpsc::channel ──→ pump_events ──→ ActionQueue
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tonesync_core::config::MediaConfig;
use tonesync_core::domain::{EntryResolver, FileAction};
use tonesync_core::queue::ActionQueue;

/// A filesystem change observed under the source root
///
/// Internal representation decoupled from the `notify` crate's raw event
/// types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEvent {
    /// A new file appeared at the given path
    Created(PathBuf),
    /// An existing file's content or metadata changed
    Modified(PathBuf),
    /// A file disappeared from the given path
    Deleted(PathBuf),
    /// A file was renamed/moved
    Renamed {
        /// The original path before the rename
        old: PathBuf,
        /// The new path after the rename
        new: PathBuf,
    },
}

/// Watches the source library using the OS-native mechanism
///
/// On Linux this typically uses inotify. Raw events are mapped to
/// [`LibraryEvent`] values and sent through the channel returned by
/// [`LibraryWatcher::new`]; events arrive with no ordering guarantee
/// relative to a concurrent full scan.
pub struct LibraryWatcher {
    watcher: RecommendedWatcher,
}

impl LibraryWatcher {
    /// Creates a watcher and the receiving end of its event channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying OS watcher cannot be created.
    pub fn new() -> Result<(Self, mpsc::Receiver<LibraryEvent>)> {
        let (event_tx, event_rx) = mpsc::channel::<LibraryEvent>(1024);

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if let Some(change) = map_notify_event(&event) {
                        // The notify callback runs on its own thread, so a
                        // blocking send is the correct bridge into async.
                        if let Err(e) = event_tx.blocking_send(change) {
                            warn!(error = %e, "Failed to forward watch event (receiver dropped)");
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "File watcher error");
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create file watcher")?;

        Ok((Self { watcher }, event_rx))
    }

    /// Starts watching `root` recursively.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be watched (does not exist,
    /// insufficient permissions, or the inotify watch limit is reached).
    pub fn watch(&mut self, root: &Path) -> Result<()> {
        info!(path = %root.display(), "Starting recursive watch");

        self.watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch path: {}", root.display()))?;

        Ok(())
    }
}

/// Converts a `notify::Event` into a [`LibraryEvent`]
///
/// - `Create(*)` → `Created`
/// - `Modify(Data(*))` and other `Modify(*)` → `Modified`
/// - `Modify(Name(Both))` with two paths → `Renamed`
/// - `Remove(*)` → `Deleted`
///
/// Returns `None` for events without paths and for access events.
fn map_notify_event(event: &notify::Event) -> Option<LibraryEvent> {
    let paths = &event.paths;

    match &event.kind {
        EventKind::Create(_) => {
            let path = paths.first()?;
            Some(LibraryEvent::Created(path.clone()))
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if paths.len() >= 2 {
                Some(LibraryEvent::Renamed {
                    old: paths[0].clone(),
                    new: paths[1].clone(),
                })
            } else {
                // Rename halves delivered separately; treat the visible
                // side as a modification and let reconciliation catch up.
                let path = paths.first()?;
                Some(LibraryEvent::Modified(path.clone()))
            }
        }

        EventKind::Modify(_) => {
            let path = paths.first()?;
            Some(LibraryEvent::Modified(path.clone()))
        }

        EventKind::Remove(_) => {
            let path = paths.first()?;
            Some(LibraryEvent::Deleted(path.clone()))
        }

        _ => {
            debug!(kind = ?event.kind, "Ignoring event kind");
            None
        }
    }
}

/// Consumes watch events and turns them into queue actions.
///
/// Mapping: create → `Create`, change → `Create`, delete → `Delete`,
/// rename → `Delete` for the old path then `Create` for the new path.
/// Paths without a recognized media extension are dropped. Runs until the
/// channel closes or the cancellation signal fires.
pub async fn pump_events(
    mut events: mpsc::Receiver<LibraryEvent>,
    queue: Arc<ActionQueue>,
    resolver: Arc<EntryResolver>,
    media: MediaConfig,
    cancel: CancellationToken,
) {
    info!("Watch event pump started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Watch event pump cancelled");
                break;
            }
            event = events.recv() => {
                match event {
                    Some(event) => apply_event(event, &queue, &resolver, &media).await,
                    None => {
                        info!("Watch channel closed, event pump shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Enqueues the action(s) corresponding to one watch event.
async fn apply_event(
    event: LibraryEvent,
    queue: &ActionQueue,
    resolver: &EntryResolver,
    media: &MediaConfig,
) {
    match event {
        LibraryEvent::Created(path) | LibraryEvent::Modified(path) => {
            enqueue_for(path, FileAction::Create, queue, resolver, media).await;
        }
        LibraryEvent::Deleted(path) => {
            enqueue_for(path, FileAction::Delete, queue, resolver, media).await;
        }
        LibraryEvent::Renamed { old, new } => {
            // Old path first so a same-identity rename settles on Create
            enqueue_for(old, FileAction::Delete, queue, resolver, media).await;
            enqueue_for(new, FileAction::Create, queue, resolver, media).await;
        }
    }
}

async fn enqueue_for(
    path: PathBuf,
    action: FileAction,
    queue: &ActionQueue,
    resolver: &EntryResolver,
    media: &MediaConfig,
) {
    if !media.is_media_path(&path) {
        return;
    }

    match resolver.resolve_path(&path) {
        Ok(entry) => {
            info!(
                path = %path.display(),
                action = ?action,
                "Watch event enqueued"
            );
            queue.enqueue(entry, action).await;
        }
        Err(error) => {
            warn!(
                path = %path.display(),
                error = %error,
                "Ignoring watch event for unresolvable path"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    // ------------------------------------------------------------------
    // Event mapping tests
    // ------------------------------------------------------------------

    #[test]
    fn test_map_create_event() {
        let event = notify::Event {
            kind: EventKind::Create(notify::event::CreateKind::File),
            paths: vec![PathBuf::from("/a.flac")],
            attrs: Default::default(),
        };
        let mapped = map_notify_event(&event).unwrap();
        assert_eq!(mapped, LibraryEvent::Created(PathBuf::from("/a.flac")));
    }

    #[test]
    fn test_map_modify_data_event() {
        let event = notify::Event {
            kind: EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Content)),
            paths: vec![PathBuf::from("/a.flac")],
            attrs: Default::default(),
        };
        let mapped = map_notify_event(&event).unwrap();
        assert_eq!(mapped, LibraryEvent::Modified(PathBuf::from("/a.flac")));
    }

    #[test]
    fn test_map_rename_event() {
        let event = notify::Event {
            kind: EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            paths: vec![PathBuf::from("/old.flac"), PathBuf::from("/new.flac")],
            attrs: Default::default(),
        };
        let mapped = map_notify_event(&event).unwrap();
        assert_eq!(
            mapped,
            LibraryEvent::Renamed {
                old: PathBuf::from("/old.flac"),
                new: PathBuf::from("/new.flac"),
            }
        );
    }

    #[test]
    fn test_map_rename_single_path_fallback() {
        let event = notify::Event {
            kind: EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            paths: vec![PathBuf::from("/only.flac")],
            attrs: Default::default(),
        };
        let mapped = map_notify_event(&event).unwrap();
        assert_eq!(mapped, LibraryEvent::Modified(PathBuf::from("/only.flac")));
    }

    #[test]
    fn test_map_remove_event() {
        let event = notify::Event {
            kind: EventKind::Remove(notify::event::RemoveKind::File),
            paths: vec![PathBuf::from("/a.flac")],
            attrs: Default::default(),
        };
        let mapped = map_notify_event(&event).unwrap();
        assert_eq!(mapped, LibraryEvent::Deleted(PathBuf::from("/a.flac")));
    }

    #[test]
    fn test_map_access_event_ignored() {
        let event = notify::Event {
            kind: EventKind::Access(notify::event::AccessKind::Read),
            paths: vec![PathBuf::from("/a.flac")],
            attrs: Default::default(),
        };
        assert!(map_notify_event(&event).is_none());
    }

    #[test]
    fn test_map_event_without_paths_ignored() {
        let event = notify::Event {
            kind: EventKind::Create(notify::event::CreateKind::File),
            paths: vec![],
            attrs: Default::default(),
        };
        assert!(map_notify_event(&event).is_none());
    }

    // ------------------------------------------------------------------
    // Event pump tests
    // ------------------------------------------------------------------

    fn resolver() -> Arc<EntryResolver> {
        Arc::new(EntryResolver::new(
            PathBuf::from("/src"),
            PathBuf::from("/dst"),
            HashMap::from([("flac".to_string(), "mp3".to_string())]),
        ))
    }

    #[tokio::test]
    async fn test_pump_translates_events_into_actions() {
        let (tx, rx) = mpsc::channel(16);
        let queue = Arc::new(ActionQueue::new());
        let cancel = CancellationToken::new();

        tx.send(LibraryEvent::Created(PathBuf::from("/src/a.flac")))
            .await
            .unwrap();
        tx.send(LibraryEvent::Modified(PathBuf::from("/src/a.flac")))
            .await
            .unwrap();
        tx.send(LibraryEvent::Deleted(PathBuf::from("/src/b.mp3")))
            .await
            .unwrap();
        drop(tx);

        pump_events(
            rx,
            Arc::clone(&queue),
            resolver(),
            MediaConfig::default(),
            cancel,
        )
        .await;

        // Created + Modified for the same path deduplicate to one Create
        assert_eq!(queue.len().await, 2);
        let first = queue.dequeue().await.unwrap();
        assert_eq!(first.action, FileAction::Create);
        assert_eq!(first.entry.relative_source(), "a.flac");
        let second = queue.dequeue().await.unwrap();
        assert_eq!(second.action, FileAction::Delete);
        assert_eq!(second.entry.relative_source(), "b.mp3");
    }

    #[tokio::test]
    async fn test_pump_rename_emits_delete_then_create() {
        let (tx, rx) = mpsc::channel(16);
        let queue = Arc::new(ActionQueue::new());

        tx.send(LibraryEvent::Renamed {
            old: PathBuf::from("/src/old.flac"),
            new: PathBuf::from("/src/new.flac"),
        })
        .await
        .unwrap();
        drop(tx);

        pump_events(
            rx,
            Arc::clone(&queue),
            resolver(),
            MediaConfig::default(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(queue.len().await, 2);
        let first = queue.dequeue().await.unwrap();
        assert_eq!(first.action, FileAction::Delete);
        assert_eq!(first.entry.relative_source(), "old.flac");
        let second = queue.dequeue().await.unwrap();
        assert_eq!(second.action, FileAction::Create);
        assert_eq!(second.entry.relative_source(), "new.flac");
    }

    #[tokio::test]
    async fn test_pump_filters_unrecognized_extensions() {
        let (tx, rx) = mpsc::channel(16);
        let queue = Arc::new(ActionQueue::new());

        tx.send(LibraryEvent::Created(PathBuf::from("/src/cover.jpg")))
            .await
            .unwrap();
        drop(tx);

        pump_events(
            rx,
            Arc::clone(&queue),
            resolver(),
            MediaConfig::default(),
            CancellationToken::new(),
        )
        .await;

        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_pump_exits_on_cancellation() {
        let (_tx, rx) = mpsc::channel::<LibraryEvent>(16);
        let queue = Arc::new(ActionQueue::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            pump_events(rx, queue, resolver(), MediaConfig::default(), cancel),
        )
        .await
        .expect("Pump should exit when the token is cancelled");
    }
}
