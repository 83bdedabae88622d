//! Transcode capability port (driven/secondary port)

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// External audio conversion capability
///
/// Converts one source file into one target file. Failure must surface as
/// a distinguishable error; the engine logs it and drops the item rather
/// than treating the mirror file as written.
#[async_trait]
pub trait ITranscoder: Send + Sync {
    /// Convert `source` into `target`, overwriting an existing target.
    ///
    /// Cancellation is cooperative: an in-flight conversion is requested
    /// to abort when `cancel` fires, and the call returns an error.
    async fn convert(
        &self,
        source: &Path,
        target: &Path,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()>;
}
