//! Port definitions (adapter interfaces)
//!
//! Traits that form the boundaries of the engine. The core depends on
//! these interfaces; their implementations live in adapter crates:
//!
//! - [`IMediaIndex`] - the persistent per-file index (SQLite in
//!   `tonesync-index`)
//! - [`ITranscoder`] - the external audio conversion capability (ffmpeg in
//!   `tonesync-sync`)

pub mod media_index;
pub mod transcoder;

pub use media_index::{IMediaIndex, IndexMutation};
pub use transcoder::ITranscoder;
