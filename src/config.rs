//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// What a session's age is measured from when sweeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryBasis {
    /// Age since the session was created
    #[default]
    Created,
    /// Age since the last command or delivered chunk
    LastActivity,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions older than this are removed by the sweep
    pub max_age_secs: u64,

    /// How often the expiry sweep runs
    pub sweep_interval_secs: u64,

    /// Age measured from creation or from last activity
    pub expiry: ExpiryBasis,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 3600,
            sweep_interval_secs: 60,
            expiry: ExpiryBasis::Created,
        }
    }
}

/// Output encoding used for every transcoded stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputProfile {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for OutputProfile {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
        }
    }
}

/// External tool and pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Transcoder binary
    pub ffmpeg_path: PathBuf,

    /// Media inspection binary
    pub ffprobe_path: PathBuf,

    /// Maximum time allowed for one inspection
    pub probe_timeout_secs: u64,

    /// Largest chunk read from the transcoder at once
    pub chunk_size: usize,

    /// Re-check interval while a stream is paused
    pub pause_poll_ms: u64,

    /// Time allowed between SIGTERM and SIGKILL
    pub terminate_grace_secs: u64,

    /// Output codecs
    pub output: OutputProfile,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            probe_timeout_secs: 10,
            chunk_size: 8192,
            pause_poll_ms: 50,
            terminate_grace_secs: 5,
            output: OutputProfile::default(),
        }
    }
}

impl TranscoderConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms.max(1))
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_secs(self.terminate_grace_secs)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Only media below this directory may be inspected or streamed
    pub media_root: String,

    /// Session configuration
    pub session: SessionConfig,

    /// Transcoder configuration
    pub transcoder: TranscoderConfig,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            media_root: "~".to_string(),
            session: SessionConfig::default(),
            transcoder: TranscoderConfig::default(),
            cors_enabled: true,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var("MEDIA_ROOT") {
            if !root.trim().is_empty() {
                self.media_root = root;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.session.max_age_secs, 3600);
        assert_eq!(config.session.expiry, ExpiryBasis::Created);
        assert_eq!(config.transcoder.chunk_size, 8192);
        assert_eq!(config.transcoder.output.crf, 23);
    }

    #[test]
    fn test_durations() {
        let transcoder = TranscoderConfig {
            pause_poll_ms: 0,
            ..Default::default()
        };
        assert_eq!(transcoder.pause_poll(), Duration::from_millis(1));
        assert_eq!(transcoder.terminate_grace(), Duration::from_secs(5));
        assert_eq!(transcoder.probe_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.socket_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_expiry_basis_names() {
        let basis: ExpiryBasis = serde_json::from_str("\"last_activity\"").unwrap();
        assert_eq!(basis, ExpiryBasis::LastActivity);
    }
}
