//! Configuration module for Tonesync.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation and defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File name of the index database, created inside the target root.
///
/// The leading dot keeps it out of casual directory listings, and the
/// extension is not a recognized media type, so the index never shows up
/// as a file to mirror.
pub const INDEX_DB_FILE: &str = ".tonesync.db";

/// Top-level configuration for Tonesync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub worker: WorkerConfig,
    pub media: MediaConfig,
    pub logging: LoggingConfig,
}

/// Source and target library roots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Root directory of the source media library (watched and scanned).
    pub source: PathBuf,
    /// Root directory of the mirrored (transcoded) library.
    pub target: PathBuf,
}

/// Drain loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Milliseconds between drain-loop ticks.
    pub tick_interval_ms: u64,
    /// Upper bound on concurrent per-file operations (drain and scan).
    pub concurrency: usize,
}

/// Recognized media types and conversion mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// File extensions treated as media (matched case-insensitively).
    pub extensions: Vec<String>,
    /// Extension rewrite map applied when deriving the target path.
    /// Extensions without a mapping pass through unchanged.
    pub conversions: HashMap<String, String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/tonesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("tonesync")
            .join("config.yaml")
    }

    /// Absolute-ish path of the index database inside the target root.
    pub fn index_path(&self) -> PathBuf {
        self.library.target.join(INDEX_DB_FILE)
    }

    /// Validate the configuration, returning a descriptive error on the
    /// first violated constraint.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.library.source.as_os_str().is_empty() {
            anyhow::bail!("library.source must not be empty");
        }
        if self.library.target.as_os_str().is_empty() {
            anyhow::bail!("library.target must not be empty");
        }
        if self.worker.tick_interval_ms == 0 {
            anyhow::bail!("worker.tick_interval_ms must be at least 1");
        }
        if self.worker.concurrency == 0 {
            anyhow::bail!("worker.concurrency must be at least 1");
        }
        if self.media.extensions.is_empty() {
            anyhow::bail!("media.extensions must list at least one extension");
        }
        for (from, to) in &self.media.conversions {
            if to.is_empty() {
                anyhow::bail!("media.conversions.{from} maps to an empty extension");
            }
        }
        Ok(())
    }
}

impl MediaConfig {
    /// Returns true when `path` has a recognized media extension.
    ///
    /// Matching is case-insensitive; files without an extension are never
    /// media.
    pub fn is_media_path(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        let music = dirs::audio_dir()
            .unwrap_or_else(|| PathBuf::from("~").join("Music"));
        Self {
            source: music.clone(),
            target: music.with_file_name("MusicMirror"),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            concurrency: 8,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            extensions: ["flac", "aac", "m4a", "mp3", "ogg"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            conversions: HashMap::from([("flac".to_string(), "mp3".to_string())]),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.worker.tick_interval_ms, 1000);
        assert!(cfg.worker.concurrency > 0);
        assert!(cfg.media.extensions.iter().any(|e| e == "flac"));
        assert_eq!(cfg.media.conversions.get("flac").unwrap(), "mp3");
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn default_config_passes_validation() {
        Config::default().validate().expect("default config is valid");
    }

    #[test]
    fn validation_rejects_zero_tick_interval() {
        let mut cfg = Config::default();
        cfg.worker.tick_interval_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validation_rejects_empty_extension_list() {
        let mut cfg = Config::default();
        cfg.media.extensions.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validation_rejects_empty_conversion_target() {
        let mut cfg = Config::default();
        cfg.media
            .conversions
            .insert("wav".to_string(), String::new());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let p = Config::default_path();
        assert!(p.ends_with("tonesync/config.yaml"));
    }

    #[test]
    fn index_path_lives_inside_target() {
        let mut cfg = Config::default();
        cfg.library.target = PathBuf::from("/srv/mirror");
        assert_eq!(cfg.index_path(), PathBuf::from("/srv/mirror/.tonesync.db"));
    }

    #[test]
    fn is_media_path_matches_case_insensitively() {
        let media = MediaConfig::default();
        assert!(media.is_media_path(Path::new("/lib/album/track.FLAC")));
        assert!(media.is_media_path(Path::new("/lib/album/track.mp3")));
        assert!(!media.is_media_path(Path::new("/lib/album/cover.jpg")));
        assert!(!media.is_media_path(Path::new("/lib/album/README")));
    }

    #[test]
    fn load_parses_partial_yaml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "library:\n  source: /music/source\n  target: /music/mirror\nworker:\n  tick_interval_ms: 250\n",
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.library.source, PathBuf::from("/music/source"));
        assert_eq!(cfg.worker.tick_interval_ms, 250);
        // Unspecified sections fall back to defaults
        assert_eq!(cfg.worker.concurrency, WorkerConfig::default().concurrency);
        assert!(!cfg.media.extensions.is_empty());
    }

    #[test]
    fn load_or_default_falls_back_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.worker.tick_interval_ms, 1000);
    }
}
