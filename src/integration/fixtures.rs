//! Test fixtures for integration tests
//!
//! Stand-ins for the external tools: shell scripts posing as ffmpeg/ffprobe
//! and a canned inspection report, plus a throwaway media root.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::media_path::MediaRoot;
use crate::state::AppState;
use crate::tracks::{MediaInspector, MediaReport};

/// Inspection report with streams in the order
/// [video, subtitle, audio, audio, subtitle]
pub const SAMPLE_REPORT: &str = r#"{
  "streams": [
    {"index": 0, "codec_type": "video", "codec_name": "h264"},
    {"index": 1, "codec_type": "subtitle", "codec_name": "subrip",
     "tags": {"language": "eng"}},
    {"index": 2, "codec_type": "audio", "codec_name": "eac3",
     "tags": {"language": "eng", "title": "Surround 5.1"}},
    {"index": 3, "codec_type": "audio", "codec_name": "aac",
     "tags": {"language": "fre"}},
    {"index": 4, "codec_type": "subtitle", "codec_name": "ass"}
  ],
  "format": {"filename": "movie.mkv", "duration": "5400.000000"}
}"#;

/// Script body that writes one byte, then ignores SIGTERM forever
pub const IGNORES_SIGTERM: &str = "trap '' TERM; printf x; while :; do sleep 0.1; done";

/// Write an executable `/bin/sh` script
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Script that prints [`SAMPLE_REPORT`] whatever its arguments
pub fn fake_ffprobe(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "ffprobe",
        &format!("cat <<'EOF'\n{}\nEOF", SAMPLE_REPORT),
    )
}

/// True while `pid` names a live (or unreaped) process
pub fn process_exists(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Inspector returning a fixed report
pub struct StaticInspector(pub MediaReport);

impl StaticInspector {
    pub fn sample() -> Self {
        Self(serde_json::from_str(SAMPLE_REPORT).unwrap())
    }
}

#[async_trait]
impl MediaInspector for StaticInspector {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn inspect(&self, _path: &Path) -> Result<MediaReport> {
        Ok(self.0.clone())
    }
}

/// A temporary media root holding `movie.mkv`, and a directory for tools
pub struct MediaFixture {
    pub media: TempDir,
    pub tools: TempDir,
}

impl MediaFixture {
    pub fn new() -> Self {
        let media = tempfile::tempdir().unwrap();
        fs::write(media.path().join("movie.mkv"), b"not really a movie").unwrap();
        Self {
            media,
            tools: tempfile::tempdir().unwrap(),
        }
    }

    pub fn movie(&self) -> PathBuf {
        self.media.path().join("movie.mkv")
    }

    /// Install a fake transcoder with the given script body
    pub fn ffmpeg(&self, body: &str) -> PathBuf {
        write_script(self.tools.path(), "ffmpeg", body)
    }

    pub fn config(&self, ffmpeg: &Path) -> ServerConfig {
        let mut config = ServerConfig {
            media_root: self.media.path().to_string_lossy().into_owned(),
            ..ServerConfig::default()
        };
        config.transcoder.ffmpeg_path = ffmpeg.to_path_buf();
        config.transcoder.ffprobe_path = fake_ffprobe(self.tools.path());
        config.transcoder.pause_poll_ms = 20;
        config.transcoder.terminate_grace_secs = 1;
        config
    }

    /// Application state using the fake ffprobe and `ffmpeg`
    pub fn state(&self, ffmpeg: &Path) -> Arc<AppState> {
        Arc::new(AppState::new(self.config(ffmpeg)))
    }

    /// Application state with an in-process inspector
    pub fn state_with_static_inspector(&self, ffmpeg: &Path) -> Arc<AppState> {
        let config = self.config(ffmpeg);
        let paths = Arc::new(MediaRoot::new(&config.media_root));
        Arc::new(AppState::with_collaborators(
            config,
            Arc::new(StaticInspector::sample()),
            paths,
        ))
    }
}
