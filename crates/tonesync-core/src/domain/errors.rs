//! Domain-level error classification

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by pure domain logic
#[derive(Debug, Error)]
pub enum DomainError {
    /// A path handed to the resolver does not live under the source root
    #[error("path is outside the source library: {0}")]
    OutsideLibrary(PathBuf),

    /// A path could not be represented as a UTF-8 relative key
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),
}
