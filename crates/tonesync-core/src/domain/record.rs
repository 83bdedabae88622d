//! Persisted per-file index state

use chrono::{DateTime, Utc};

use super::entry::MediaEntry;

/// One row of the persistent index: the durable record that a source file
/// has been mirrored.
///
/// Keyed by `source_path` (relative to the source root, unique). Deleting
/// the record is how "the target is no longer tracked" is represented;
/// there is no tombstone state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    /// Relative path of the source file, the primary key.
    pub source_path: String,
    /// Relative path of the mirrored file under the target root.
    pub target_path: String,
    /// When the file was last successfully processed (UTC).
    pub processed_at: DateTime<Utc>,
}

impl IndexRecord {
    /// Derive a fresh record from a resolved entry.
    pub fn for_entry(entry: &MediaEntry, processed_at: DateTime<Utc>) -> Self {
        Self {
            source_path: entry.relative_source().to_string(),
            target_path: entry.relative_target().to_string(),
            processed_at,
        }
    }

    /// The same record identity with an updated timestamp.
    ///
    /// Used when re-processing an already-tracked file: the recorded target
    /// path is preserved so a changed conversion map cannot orphan the
    /// previously written mirror file.
    pub fn touched(&self, processed_at: DateTime<Utc>) -> Self {
        Self {
            source_path: self.source_path.clone(),
            target_path: self.target_path.clone(),
            processed_at,
        }
    }
}
