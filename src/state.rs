//! Application state
//!
//! `AppState` is the command surface the transport calls into. It owns the
//! session store and the collaborators used for tracks and streams.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::{PlaybackError, Result};
use crate::media_path::{MediaRoot, PathValidator};
use crate::session::{
    estimate, ControlRequest, PlaybackCommand, PlaybackRecord, SessionId, SessionStore,
};
use crate::tracks::{discover_tracks, FfprobeInspector, MediaInspector, TrackCatalog};
use crate::transcode::{ByteStream, PipelineController};

/// Record snapshot plus the live position derived from it
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    #[serde(flatten)]
    pub record: PlaybackRecord,
    /// Best estimate of the current position
    pub position: f64,
    /// Present while a stream is anchored and advancing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_current_time: Option<f64>,
    /// Present while paused
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_elapsed: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: SessionId,
    pub state: StatusView,
}

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,

    /// Playback sessions
    pub sessions: SessionStore,

    inspector: Arc<dyn MediaInspector>,
    paths: Arc<dyn PathValidator>,
    pipelines: PipelineController,
}

impl AppState {
    /// Create a new AppState backed by ffprobe/ffmpeg and the configured
    /// media root
    pub fn new(config: ServerConfig) -> Self {
        let inspector = Arc::new(FfprobeInspector::from_config(&config.transcoder));
        let paths = Arc::new(MediaRoot::new(&config.media_root));
        Self::with_collaborators(config, inspector, paths)
    }

    pub fn with_collaborators(
        config: ServerConfig,
        inspector: Arc<dyn MediaInspector>,
        paths: Arc<dyn PathValidator>,
    ) -> Self {
        let sessions = SessionStore::new();
        let pipelines = PipelineController::new(sessions.clone(), config.transcoder.clone());
        Self {
            config,
            sessions,
            inspector,
            paths,
            pipelines,
        }
    }

    /// Create AppState with default configuration
    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    pub fn pipelines(&self) -> &PipelineController {
        &self.pipelines
    }

    pub fn create_session(&self) -> SessionId {
        self.sessions.create_session()
    }

    /// Return `id` if it names a live session, otherwise a new session's id
    pub fn create_or_get_session(&self, id: Option<&str>) -> SessionId {
        self.sessions.get_or_create(id).0
    }

    pub fn session(&self, id: &str) -> Result<PlaybackRecord> {
        self.sessions
            .get_session(id)
            .ok_or_else(|| PlaybackError::SessionNotFound(id.to_string()))
    }

    /// Snapshot of a session with its estimated position. Read-only.
    pub fn status(&self, id: &str) -> Result<SessionStatus> {
        let record = self.session(id)?;
        let est = estimate(&record, Utc::now());
        Ok(SessionStatus {
            session_id: SessionId::from(id),
            state: StatusView {
                position: est.position,
                computed_current_time: est.computed.then_some(est.position),
                pause_elapsed: est.pause_elapsed,
                record,
            },
        })
    }

    /// Validate and apply a control request. The command is parsed before
    /// any session is looked up, so a rejected request never creates one.
    pub fn apply_command(
        &self,
        id: Option<&str>,
        request: &ControlRequest,
    ) -> Result<(SessionId, PlaybackRecord)> {
        let command = PlaybackCommand::from_request(request)?;
        Ok(self.apply(id, &command))
    }

    /// Validate and store a track selection
    pub fn select_tracks(
        &self,
        id: Option<&str>,
        audio: Option<&Value>,
        subtitle: Option<&Value>,
    ) -> Result<(SessionId, PlaybackRecord)> {
        let command = PlaybackCommand::select_tracks(audio, subtitle)?;
        Ok(self.apply(id, &command))
    }

    fn apply(&self, id: Option<&str>, command: &PlaybackCommand) -> (SessionId, PlaybackRecord) {
        let (id, record) = self.sessions.apply(id, command);
        match command {
            PlaybackCommand::Seek(t) => {
                tracing::info!(session_id = %id, "Seeked to {:.2}s", t)
            }
            PlaybackCommand::SetRate(r) => {
                tracing::info!(session_id = %id, "Playback rate set to {}x", r)
            }
            PlaybackCommand::SelectTracks { audio, subtitle } => tracing::info!(
                session_id = %id,
                audio = ?audio,
                subtitle = ?subtitle.as_index(),
                "Tracks selected"
            ),
            other => tracing::info!(session_id = %id, command = other.name(), "Playback command applied"),
        }
        (id, record)
    }

    /// Track catalog for a media path below the media root
    pub async fn tracks(&self, path: &str) -> Result<TrackCatalog> {
        let resolved = self.paths.validate(path)?;
        tracing::info!(path = %resolved.display(), "Discovering tracks");
        Ok(discover_tracks(self.inspector.as_ref(), &resolved).await)
    }

    /// Start streaming `path` for session `id`
    pub fn start_stream(&self, id: &str, path: &str) -> Result<ByteStream> {
        let resolved = self.paths.validate(path)?;
        if !self.sessions.contains(id) {
            return Err(PlaybackError::SessionNotFound(id.to_string()));
        }
        tracing::info!(session_id = id, path = %resolved.display(), "Streaming requested");
        self.pipelines.start(id, &resolved)
    }
}
