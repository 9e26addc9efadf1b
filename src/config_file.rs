//! Configuration file support
//!
//! Loads server configuration from TOML files. Every section except
//! `[server]` may be omitted; missing fields fall back to the defaults in
//! [`crate::config`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{ExpiryBasis, OutputProfile, ServerConfig, SessionConfig, TranscoderConfig};
use crate::error::{PlaybackError, Result};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: ServerSettings,
    /// Session settings
    pub session: Option<SessionSettings>,
    /// Transcoder settings
    pub transcoder: Option<TranscoderSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory media paths must resolve into
    pub media_root: Option<String>,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    pub max_age_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    /// "created" or "last_activity"
    pub expiry: Option<ExpiryBasis>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderSettings {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub probe_timeout_secs: Option<u64>,
    pub chunk_size: Option<usize>,
    pub pause_poll_ms: Option<u64>,
    pub terminate_grace_secs: Option<u64>,
    pub video_codec: Option<String>,
    pub preset: Option<String>,
    pub crf: Option<u8>,
    pub audio_codec: Option<String>,
    pub audio_bitrate: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| PlaybackError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PlaybackError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let defaults = ServerConfig::default();
        let transcoder = defaults.transcoder;
        Self {
            server: ServerSettings {
                host: defaults.host,
                port: defaults.port,
                media_root: Some(defaults.media_root),
                cors_enabled: Some(defaults.cors_enabled),
            },
            session: Some(SessionSettings {
                max_age_secs: Some(defaults.session.max_age_secs),
                sweep_interval_secs: Some(defaults.session.sweep_interval_secs),
                expiry: Some(defaults.session.expiry),
            }),
            transcoder: Some(TranscoderSettings {
                ffmpeg_path: Some(transcoder.ffmpeg_path),
                ffprobe_path: Some(transcoder.ffprobe_path),
                probe_timeout_secs: Some(transcoder.probe_timeout_secs),
                chunk_size: Some(transcoder.chunk_size),
                pause_poll_ms: Some(transcoder.pause_poll_ms),
                terminate_grace_secs: Some(transcoder.terminate_grace_secs),
                video_codec: Some(transcoder.output.video_codec),
                preset: Some(transcoder.output.preset),
                crf: Some(transcoder.output.crf),
                audio_codec: Some(transcoder.output.audio_codec),
                audio_bitrate: Some(transcoder.output.audio_bitrate),
            }),
            logging: Some(LoggingSettings {
                level: defaults.log_level,
                format: Some(defaults.log_format),
            }),
        }
    }

    /// Convert to ServerConfig
    pub fn into_server_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();

        let session = match self.session {
            Some(s) => SessionConfig {
                max_age_secs: s.max_age_secs.unwrap_or(defaults.session.max_age_secs),
                sweep_interval_secs: s
                    .sweep_interval_secs
                    .unwrap_or(defaults.session.sweep_interval_secs),
                expiry: s.expiry.unwrap_or(defaults.session.expiry),
            },
            None => defaults.session,
        };

        let transcoder = match self.transcoder {
            Some(t) => {
                let d = defaults.transcoder;
                TranscoderConfig {
                    ffmpeg_path: t.ffmpeg_path.unwrap_or(d.ffmpeg_path),
                    ffprobe_path: t.ffprobe_path.unwrap_or(d.ffprobe_path),
                    probe_timeout_secs: t.probe_timeout_secs.unwrap_or(d.probe_timeout_secs),
                    chunk_size: t.chunk_size.unwrap_or(d.chunk_size),
                    pause_poll_ms: t.pause_poll_ms.unwrap_or(d.pause_poll_ms),
                    terminate_grace_secs: t
                        .terminate_grace_secs
                        .unwrap_or(d.terminate_grace_secs),
                    output: OutputProfile {
                        video_codec: t.video_codec.unwrap_or(d.output.video_codec),
                        preset: t.preset.unwrap_or(d.output.preset),
                        crf: t.crf.unwrap_or(d.output.crf),
                        audio_codec: t.audio_codec.unwrap_or(d.output.audio_codec),
                        audio_bitrate: t.audio_bitrate.unwrap_or(d.output.audio_bitrate),
                    },
                }
            }
            None => defaults.transcoder,
        };

        let (log_level, log_format) = match self.logging {
            Some(l) => (l.level, l.format.unwrap_or(defaults.log_format)),
            None => (defaults.log_level, defaults.log_format),
        };

        ServerConfig {
            host: self.server.host,
            port: self.server.port,
            media_root: self.server.media_root.unwrap_or(defaults.media_root),
            session,
            transcoder,
            cors_enabled: self.server.cors_enabled.unwrap_or(defaults.cors_enabled),
            log_level,
            log_format,
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    ConfigFile::default_config().to_file(path)
}

/// Load `path` if it exists. `Ok(None)` means there is no file and the
/// defaults apply.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Option<ServerConfig>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    ConfigFile::from_file(path).map(|cf| Some(cf.into_server_config()))
}
