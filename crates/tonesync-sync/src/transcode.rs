//! ffmpeg adapter for the transcode port
//!
//! Spawns the system `ffmpeg` binary to convert one audio file into
//! another. Cancellation is cooperative: the child process is killed when
//! the shutdown signal fires mid-conversion. A non-zero exit surfaces as
//! an error carrying the tail of ffmpeg's stderr, so a failed conversion
//! is never mistaken for a written mirror file.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tonesync_core::ports::ITranscoder;

/// Name of the transcoder binary looked up on PATH.
const FFMPEG_BINARY: &str = "ffmpeg";

/// [`ITranscoder`] implementation backed by the system ffmpeg
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    /// Locates ffmpeg on PATH.
    ///
    /// # Errors
    ///
    /// Fails when no ffmpeg binary can be found; the daemon treats this as
    /// a fatal startup condition.
    pub fn locate() -> Result<Self> {
        let binary = which::which(FFMPEG_BINARY)
            .with_context(|| format!("{FFMPEG_BINARY} not found on PATH"))?;

        info!(binary = %binary.display(), "Located transcoder binary");

        Ok(Self { binary })
    }

    /// Uses an explicit binary path instead of a PATH lookup.
    pub fn with_binary(binary: PathBuf) -> Self {
        Self { binary }
    }
}

#[async_trait]
impl ITranscoder for FfmpegTranscoder {
    async fn convert(
        &self,
        source: &Path,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!(
            source = %source.display(),
            target = %target.display(),
            "Spawning ffmpeg"
        );

        let mut child = Command::new(&self.binary)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-i")
            .arg(source)
            .arg("-codec:a")
            .arg("libmp3lame")
            .arg("-b:a")
            .arg("256k")
            .arg("-id3v2_version")
            .arg("3")
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.binary.display()))?;

        // Drain stderr concurrently so a chatty child cannot fill the pipe
        // and deadlock against wait().
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                stderr_task.abort();
                anyhow::bail!("Conversion of {} aborted by shutdown", source.display());
            }
            status = child.wait() => {
                let status = status.context("Failed to wait for ffmpeg")?;
                let diagnostics = stderr_task.await.unwrap_or_default();

                if !status.success() {
                    anyhow::bail!(
                        "ffmpeg exited with {} converting {}: {}",
                        status,
                        source.display(),
                        diagnostics.trim()
                    );
                }

                Ok(())
            }
        }
    }
}
