//! Deduplicating action queue
//!
//! An ordered, at-most-once-per-identity queue of pending file operations.
//! Identity is the full `(entry, action)` value: a `Created` followed by a
//! `Changed` notification for the same file collapses into one pending
//! conversion, and a scan that re-discovers a file already queued by a
//! watcher event is a no-op.
//!
//! A [`HashSet`] mirrors the queue's membership and is maintained strictly
//! in lock-step with it: insertion adds to both or neither, removal removes
//! from both. Both structures live behind a single mutex, so an
//! enqueue/dequeue pair is atomic with respect to the membership set.

use std::collections::{HashSet, VecDeque};

use tokio::sync::Mutex;

use crate::domain::{FileAction, MediaEntry};

/// One pending file operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueItem {
    pub entry: MediaEntry,
    pub action: FileAction,
}

#[derive(Debug, Default)]
struct QueueInner {
    queue: VecDeque<QueueItem>,
    members: HashSet<QueueItem>,
}

/// Deduplicating FIFO of pending file operations
///
/// Safe for concurrent use by multiple producers (watcher, reconciler) and
/// multiple consumers (drain tasks). No ordering is guaranteed across
/// racing enqueues beyond the total order imposed by the lock.
#[derive(Debug, Default)]
pub struct ActionQueue {
    inner: Mutex<QueueInner>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits `(entry, action)` unless an identical item is already pending.
    ///
    /// Returns whether the item was admitted; a duplicate enqueue is a
    /// no-op and returns `false`.
    pub async fn enqueue(&self, entry: MediaEntry, action: FileAction) -> bool {
        let item = QueueItem { entry, action };
        let mut inner = self.inner.lock().await;

        if !inner.members.insert(item.clone()) {
            return false;
        }
        inner.queue.push_back(item);
        true
    }

    /// Removes and returns the oldest admitted item, or `None` when empty.
    ///
    /// Never blocks on an empty queue.
    pub async fn dequeue(&self) -> Option<QueueItem> {
        let mut inner = self.inner.lock().await;

        let item = inner.queue.pop_front()?;
        inner.members.remove(&item);
        Some(item)
    }

    /// Instantaneous number of pending items.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    /// Instantaneous emptiness snapshot.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use crate::domain::EntryResolver;

    use super::*;

    fn entry(name: &str) -> MediaEntry {
        let resolver = EntryResolver::new(
            PathBuf::from("/src"),
            PathBuf::from("/dst"),
            HashMap::from([("flac".to_string(), "mp3".to_string())]),
        );
        resolver
            .resolve_path(&Path::new("/src").join(name))
            .unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_admits_new_item() {
        let queue = ActionQueue::new();
        assert!(queue.enqueue(entry("a.flac"), FileAction::Create).await);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_enqueue_is_noop() {
        let queue = ActionQueue::new();
        assert!(queue.enqueue(entry("a.flac"), FileAction::Create).await);
        assert!(!queue.enqueue(entry("a.flac"), FileAction::Create).await);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_same_entry_different_action_both_admitted() {
        let queue = ActionQueue::new();
        assert!(queue.enqueue(entry("a.flac"), FileAction::Create).await);
        assert!(queue.enqueue(entry("a.flac"), FileAction::Delete).await);
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn test_dequeue_is_fifo() {
        let queue = ActionQueue::new();
        queue.enqueue(entry("a.flac"), FileAction::Create).await;
        queue.enqueue(entry("b.flac"), FileAction::Create).await;
        queue.enqueue(entry("c.flac"), FileAction::Delete).await;

        assert_eq!(
            queue.dequeue().await.unwrap().entry.relative_source(),
            "a.flac"
        );
        assert_eq!(
            queue.dequeue().await.unwrap().entry.relative_source(),
            "b.flac"
        );
        let last = queue.dequeue().await.unwrap();
        assert_eq!(last.entry.relative_source(), "c.flac");
        assert_eq!(last.action, FileAction::Delete);
    }

    #[tokio::test]
    async fn test_dequeue_empty_returns_none() {
        let queue = ActionQueue::new();
        assert!(queue.dequeue().await.is_none());
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_dequeue_releases_identity_for_re_enqueue() {
        let queue = ActionQueue::new();
        queue.enqueue(entry("a.flac"), FileAction::Create).await;
        queue.dequeue().await.unwrap();

        // Once dequeued, the same identity may be admitted again
        assert!(queue.enqueue(entry("a.flac"), FileAction::Create).await);
    }

    #[tokio::test]
    async fn test_concurrent_producers_deduplicate() {
        let queue = Arc::new(ActionQueue::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                queue.enqueue(entry("a.flac"), FileAction::Create).await
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 1);
        assert_eq!(queue.len().await, 1);
    }
}
