//! Resolved media entries and the path resolver
//!
//! A [`MediaEntry`] is the fully-resolved description of one logical file:
//! where it lives in the source tree, where its mirror lives in the target
//! tree, and whether getting from one to the other requires a conversion.
//! Entries are immutable values constructed per operation by the
//! [`EntryResolver`] and consumed once processed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::errors::DomainError;
use super::record::IndexRecord;

/// The two corrective operations the engine performs on the target tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileAction {
    /// (Re)create the mirror of a source file
    Create,
    /// Remove the mirror of a source file that no longer exists
    Delete,
}

/// Resolved description of one logical file
///
/// Relative paths are kept as UTF-8 strings because the relative source
/// path doubles as the index primary key; absolute paths stay `PathBuf`s
/// for filesystem calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaEntry {
    relative_source: String,
    relative_target: String,
    absolute_source: PathBuf,
    absolute_target: PathBuf,
}

impl MediaEntry {
    /// Relative source path - the index key.
    pub fn relative_source(&self) -> &str {
        &self.relative_source
    }

    /// Relative target path under the target root.
    pub fn relative_target(&self) -> &str {
        &self.relative_target
    }

    /// Absolute path of the source file.
    pub fn absolute_source(&self) -> &Path {
        &self.absolute_source
    }

    /// Absolute path of the mirrored file.
    pub fn absolute_target(&self) -> &Path {
        &self.absolute_target
    }

    /// Whether mirroring this entry requires a transcode.
    ///
    /// True exactly when the conversion map rewrote the extension; entries
    /// whose extension has no mapping pass through and are copied verbatim.
    pub fn requires_conversion(&self) -> bool {
        self.relative_source != self.relative_target
    }
}

/// Maps paths and index records to fully-resolved [`MediaEntry`] values
///
/// Pure logic over the two library roots and the extension conversion map.
/// Conversion keys are matched case-insensitively (`FLAC` converts like
/// `flac`).
#[derive(Debug)]
pub struct EntryResolver {
    source_root: PathBuf,
    target_root: PathBuf,
    conversions: HashMap<String, String>,
}

impl EntryResolver {
    /// Creates a resolver over absolute library roots.
    pub fn new(
        source_root: PathBuf,
        target_root: PathBuf,
        conversions: HashMap<String, String>,
    ) -> Self {
        let conversions = conversions
            .into_iter()
            .map(|(from, to)| (from.to_ascii_lowercase(), to))
            .collect();
        Self {
            source_root,
            target_root,
            conversions,
        }
    }

    /// Resolve an absolute source path into an entry.
    ///
    /// # Errors
    ///
    /// Fails when the path does not live under the source root or is not
    /// representable as UTF-8 (the index key is a string column).
    pub fn resolve_path(&self, path: &Path) -> Result<MediaEntry, DomainError> {
        let relative = path
            .strip_prefix(&self.source_root)
            .map_err(|_| DomainError::OutsideLibrary(path.to_path_buf()))?;

        let relative_source = relative
            .to_str()
            .ok_or_else(|| DomainError::NonUtf8Path(path.to_path_buf()))?
            .to_string();

        let relative_target_path = self.map_target(relative);
        let relative_target = relative_target_path
            .to_str()
            .ok_or_else(|| DomainError::NonUtf8Path(path.to_path_buf()))?
            .to_string();

        Ok(MediaEntry {
            absolute_source: self.source_root.join(relative),
            absolute_target: self.target_root.join(&relative_target_path),
            relative_source,
            relative_target,
        })
    }

    /// Resolve a persisted record back into an entry.
    ///
    /// The recorded target path is authoritative: it reflects the
    /// conversion map in force when the file was processed.
    pub fn resolve_record(&self, record: &IndexRecord) -> MediaEntry {
        MediaEntry {
            absolute_source: self.source_root.join(&record.source_path),
            absolute_target: self.target_root.join(&record.target_path),
            relative_source: record.source_path.clone(),
            relative_target: record.target_path.clone(),
        }
    }

    /// Apply the extension conversion map to a relative source path.
    fn map_target(&self, relative: &Path) -> PathBuf {
        if let Some(ext) = relative.extension().and_then(|e| e.to_str()) {
            if let Some(mapped) = self.conversions.get(&ext.to_ascii_lowercase()) {
                return relative.with_extension(mapped);
            }
        }
        relative.to_path_buf()
    }
}
