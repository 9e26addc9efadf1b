//! HTTP request handlers
//!
//! Thin adapters from HTTP requests to the `AppState` command surface.

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::PlaybackError;
use crate::session::ControlRequest;
use crate::state::AppState;

/// HTTP error type
#[derive(Debug)]
pub struct HttpError(pub PlaybackError);

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            PlaybackError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg),
            PlaybackError::UnknownCommand(action) => {
                (StatusCode::BAD_REQUEST, format!("unknown action: {}", action))
            }
            PlaybackError::SessionNotFound(_) => {
                (StatusCode::NOT_FOUND, "Session not found".to_string())
            }
            PlaybackError::MediaNotFound(_) => {
                (StatusCode::NOT_FOUND, "Video not found".to_string())
            }
            PlaybackError::AccessDenied(_) => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            err @ PlaybackError::UnavailableExternalTool { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            err => {
                tracing::error!("Internal error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<PlaybackError> for HttpError {
    fn from(err: PlaybackError) -> Self {
        HttpError(err)
    }
}

type HttpResult = Result<Response, HttpError>;

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MediaQuery {
    pub path: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SelectTracksRequest {
    pub session_id: Option<String>,
    pub audio_index: Option<Value>,
    pub subtitle_index: Option<Value>,
}

/// Decode an optional JSON body; an empty body is the default value
fn json_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, HttpError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| HttpError(PlaybackError::invalid(format!("invalid JSON body: {}", e))))
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, HttpError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| HttpError(PlaybackError::invalid(format!("{} parameter is required", name))))
}

/// Body field wins over the query string
fn pick_session<'a>(body: &'a Option<String>, query: &'a SessionQuery) -> Option<&'a str> {
    body.as_deref()
        .filter(|s| !s.is_empty())
        .or(query.session_id.as_deref().filter(|s| !s.is_empty()))
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Version endpoint
pub async fn version_check() -> &'static str {
    concat!("playback-server v", env!("CARGO_PKG_VERSION"))
}

/// POST /session
pub async fn create_session(State(state): State<Arc<AppState>>) -> Response {
    let session_id = state.create_session();
    (StatusCode::CREATED, Json(json!({ "session_id": session_id }))).into_response()
}

/// GET /session?session_id=
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> HttpResult {
    let Some(id) = query.session_id.as_deref().filter(|s| !s.is_empty()) else {
        let session_id = state.create_session();
        return Ok(Json(json!({
            "session_id": session_id,
            "note": "no session provided, created new",
        }))
        .into_response());
    };

    match state.session(id) {
        Ok(record) => {
            tracing::info!(session_id = id, "Session verified");
            Ok(Json(json!({ "session_id": id, "state": record })).into_response())
        }
        Err(e) => {
            tracing::warn!(session_id = id, "Invalid session requested");
            Err(e.into())
        }
    }
}

/// GET /tracks?path=
pub async fn tracks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MediaQuery>,
) -> HttpResult {
    let path = required(&query.path, "'path'")?;
    let catalog = state.tracks(path).await?;
    Ok(Json(catalog).into_response())
}

/// POST /select_tracks
pub async fn select_tracks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> HttpResult {
    let request: SelectTracksRequest = json_body(&body)?;
    let (session_id, _) = state.select_tracks(
        pick_session(&request.session_id, &query),
        request.audio_index.as_ref(),
        request.subtitle_index.as_ref(),
    )?;
    Ok(Json(json!({ "ok": true, "session_id": session_id })).into_response())
}

/// POST /control
pub async fn control(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> HttpResult {
    let request: ControlRequest = json_body(&body)?;
    let (session_id, record) =
        state.apply_command(pick_session(&request.session_id, &query), &request)?;
    Ok(Json(json!({ "ok": true, "session_id": session_id, "state": record })).into_response())
}

/// GET /status?session_id=
pub async fn status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> HttpResult {
    let id = required(&query.session_id, "session_id")?;
    Ok(Json(state.status(id)?).into_response())
}

/// GET /stream?path=&session_id=
///
/// The body is fed by the transcoder pipeline; when the client goes away the
/// body is dropped and the pipeline shuts its transcoder down.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MediaQuery>,
) -> HttpResult {
    let path = query
        .path
        .as_deref()
        .ok_or_else(|| HttpError(PlaybackError::MediaNotFound(String::new())))?;
    let id = required(&query.session_id, "session_id")?;

    let bytes = state.start_stream(id, path)?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok((headers, Body::from_stream(bytes)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (PlaybackError::invalid("bad"), StatusCode::BAD_REQUEST),
            (PlaybackError::UnknownCommand("x".into()), StatusCode::BAD_REQUEST),
            (PlaybackError::SessionNotFound("x".into()), StatusCode::NOT_FOUND),
            (PlaybackError::MediaNotFound("x".into()), StatusCode::NOT_FOUND),
            (PlaybackError::AccessDenied("x".into()), StatusCode::FORBIDDEN),
            (PlaybackError::tool("ffmpeg", "missing"), StatusCode::SERVICE_UNAVAILABLE),
            (PlaybackError::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(HttpError(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_empty_body_is_default() {
        let request: ControlRequest = json_body(&Bytes::from_static(b"")).unwrap();
        assert!(request.action.is_none());
        assert!(json_body::<ControlRequest>(&Bytes::from_static(b"{oops")).is_err());
    }

    #[test]
    fn test_body_session_wins() {
        let query = SessionQuery {
            session_id: Some("from-query".into()),
        };
        assert_eq!(pick_session(&Some("from-body".into()), &query), Some("from-body"));
        assert_eq!(pick_session(&None, &query), Some("from-query"));
        assert_eq!(pick_session(&Some(String::new()), &SessionQuery::default()), None);
    }
}
