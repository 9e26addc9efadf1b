//! Media inspection
//!
//! Runs ffprobe against a media file and turns its JSON report into a
//! [`TrackCatalog`]. Discovery never fails its caller: any inspection
//! problem yields an empty catalog.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::TranscoderConfig;
use crate::error::{PlaybackError, Result};

use super::catalog::{MediaReport, TrackCatalog};

/// Produces a structured stream/format report for a media file
#[async_trait]
pub trait MediaInspector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn inspect(&self, path: &Path) -> Result<MediaReport>;
}

/// Inspector backed by the `ffprobe` CLI
#[derive(Debug, Clone)]
pub struct FfprobeInspector {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeInspector {
    pub fn new(ffprobe_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &TranscoderConfig) -> Self {
        Self::new(config.ffprobe_path.clone(), config.probe_timeout())
    }
}

#[async_trait]
impl MediaInspector for FfprobeInspector {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn inspect(&self, path: &Path) -> Result<MediaReport> {
        let child = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlaybackError::tool(self.name(), format!("failed to spawn: {e}")))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                PlaybackError::tool(
                    self.name(),
                    format!("timed out after {}s", self.timeout.as_secs_f64()),
                )
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlaybackError::tool(
                self.name(),
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| PlaybackError::tool(self.name(), format!("JSON parse error: {e}")))
    }
}

/// Discover the audio and subtitle tracks of `path`.
///
/// Inspection failures are logged and reported as an empty catalog.
pub async fn discover_tracks(inspector: &dyn MediaInspector, path: &Path) -> TrackCatalog {
    match inspector.inspect(path).await {
        Ok(report) => {
            let catalog = TrackCatalog::from_report(&report);
            tracing::info!(
                path = %path.display(),
                "Found {} audio and {} subtitle tracks",
                catalog.audio.len(),
                catalog.subtitles.len()
            );
            catalog
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                inspector = inspector.name(),
                "Track discovery failed: {}",
                e
            );
            TrackCatalog::empty()
        }
    }
}
