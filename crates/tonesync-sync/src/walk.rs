//! Recursive enumeration of media files in the source tree
//!
//! Descends depth-first with an explicit directory stack (no ordering
//! guarantee across siblings) and keeps only files whose extension is a
//! recognized media type, matched case-insensitively. Checks the
//! cancellation signal once per directory so a large library does not
//! stall shutdown.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use tonesync_core::config::MediaConfig;

use crate::SyncError;

/// Collects every media file under `root`, recursively.
///
/// # Errors
///
/// Propagates the first I/O failure (unreadable directory, vanished root)
/// and returns [`SyncError::Cancelled`] when the shutdown signal fires
/// mid-walk. Callers treat either as a failed scan and log it.
pub async fn collect_media_files(
    root: &Path,
    media: &MediaConfig,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>, SyncError> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(dirent) = entries.next_entry().await? {
            let file_type = dirent.file_type().await?;
            let path = dirent.path();

            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() && media.is_media_path(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media() -> MediaConfig {
        MediaConfig::default()
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[tokio::test]
    async fn test_walk_finds_nested_media_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.flac"));
        touch(&dir.path().join("artist/album/b.mp3"));
        touch(&dir.path().join("artist/album/deep/c.ogg"));

        let cancel = CancellationToken::new();
        let mut files = collect_media_files(dir.path(), &media(), &cancel)
            .await
            .unwrap();
        files.sort();

        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with("a.flac"));
    }

    #[tokio::test]
    async fn test_walk_ignores_unrecognized_extensions() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("cover.jpg"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("track.flac"));

        let cancel = CancellationToken::new();
        let files = collect_media_files(dir.path(), &media(), &cancel)
            .await
            .unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("track.flac"));
    }

    #[tokio::test]
    async fn test_walk_matches_extensions_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("loud.FLAC"));
        touch(&dir.path().join("louder.Mp3"));

        let cancel = CancellationToken::new();
        let files = collect_media_files(dir.path(), &media(), &cancel)
            .await
            .unwrap();

        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_walk_empty_tree_returns_no_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("empty/nested")).unwrap();

        let cancel = CancellationToken::new();
        let files = collect_media_files(dir.path(), &media(), &cancel)
            .await
            .unwrap();

        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_walk_missing_root_is_an_error() {
        let cancel = CancellationToken::new();
        let result =
            collect_media_files(Path::new("/nonexistent/library"), &media(), &cancel).await;

        assert!(matches!(result, Err(SyncError::Io(_))));
    }

    #[tokio::test]
    async fn test_walk_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.flac"));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = collect_media_files(dir.path(), &media(), &cancel).await;
        assert!(matches!(result, Err(SyncError::Cancelled)));
    }
}
