//! Tonesync Core - Domain logic and business rules
//!
//! This crate contains the domain core of the mirroring engine:
//! - **Domain values** - `MediaEntry`, `IndexRecord`, `FileAction`, `EntryResolver`
//! - **Action queue** - deduplicating FIFO of pending file operations
//! - **Port definitions** - Traits for adapters: `IMediaIndex`, `ITranscoder`
//! - **Configuration** - typed YAML config with defaults and validation
//!
//! # Architecture
//!
//! The domain module contains pure mapping logic with no I/O. Ports define
//! trait interfaces that adapter crates implement (`tonesync-index` for the
//! persistent index, `tonesync-sync` for the transcoder). The queue is the
//! only stateful object here; it is shared between the watcher, the
//! reconciler, and the drain loop.

pub mod config;
pub mod domain;
pub mod ports;
pub mod queue;
