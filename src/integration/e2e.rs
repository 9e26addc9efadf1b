//! End-to-end tests
//!
//! Drive the router with in-process requests, and a real listener with an
//! HTTP client for streaming.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

use super::fixtures::{self, MediaFixture};
use crate::http::create_router;
use crate::state::AppState;

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn serve(state: Arc<AppState>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_playback_control_flow() {
    let fixture = MediaFixture::new();
    let app = create_router(fixture.state(&fixture.ffmpeg("true")));

    let (status, body) = send(&app, Method::POST, "/session", None).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["session_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        "/control",
        Some(json!({"action": "set_rate", "rate": 1.5, "session_id": id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["session_id"], id.as_str());
    assert_eq!(body["state"]["playback_rate"], 1.5);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/control?session_id={}", id),
        Some(json!({"action": "seek", "time": 120})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, &format!("/status?session_id={}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["position"], 120.0);
    assert_eq!(body["state"]["current_time"], 120.0);
    assert_eq!(body["state"]["is_playing"], false);

    let (_, body) = send(
        &app,
        Method::POST,
        "/control",
        Some(json!({"action": "play", "session_id": id})),
    )
    .await;
    assert_eq!(body["state"]["is_playing"], true);

    let (_, body) = send(&app, Method::GET, &format!("/status?session_id={}", id), None).await;
    let position = body["state"]["computed_current_time"].as_f64().unwrap();
    assert!((120.0..125.0).contains(&position));

    let (_, body) = send(
        &app,
        Method::POST,
        "/control",
        Some(json!({"action": "pause", "session_id": id})),
    )
    .await;
    assert_eq!(body["state"]["is_playing"], false);
    let (_, body) = send(&app, Method::GET, &format!("/status?session_id={}", id), None).await;
    assert!(body["state"]["pause_elapsed"].as_f64().is_some());
}

#[tokio::test]
async fn test_control_errors() {
    let fixture = MediaFixture::new();
    let state = fixture.state(&fixture.ffmpeg("true"));
    let app = create_router(state.clone());

    let (status, body) = send(
        &app,
        Method::POST,
        "/control",
        Some(json!({"action": "set_rate", "rate": 2.5})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "playback rate must be between 0.5 and 2; requested 2.5x"
    );

    let (status, body) = send(
        &app,
        Method::POST,
        "/control",
        Some(json!({"action": "rewind"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unknown action: rewind");

    let (status, _) = send(
        &app,
        Method::POST,
        "/control",
        Some(json!({"action": "seek", "time": "soon"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // None of the rejected commands created a session
    assert!(state.sessions.is_empty());
}

#[tokio::test]
async fn test_control_without_session_creates_one() {
    let fixture = MediaFixture::new();
    let state = fixture.state(&fixture.ffmpeg("true"));
    let app = create_router(state.clone());

    let (status, body) = send(
        &app,
        Method::POST,
        "/control",
        Some(json!({"action": "play", "session_id": "expired-id"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["session_id"].as_str().unwrap();
    assert_ne!(id, "expired-id");
    assert!(state.sessions.contains(id));
}

#[tokio::test]
async fn test_get_session() {
    let fixture = MediaFixture::new();
    let app = create_router(fixture.state(&fixture.ffmpeg("true")));

    let (status, body) = send(&app, Method::GET, "/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["note"], "no session provided, created new");
    let id = body["session_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, &format!("/session?session_id={}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["playback_rate"], 1.0);

    let (status, _) = send(&app, Method::GET, "/session?session_id=unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_select_tracks() {
    let fixture = MediaFixture::new();
    let state = fixture.state(&fixture.ffmpeg("true"));
    let app = create_router(state.clone());
    let id = state.create_session();

    let (status, body) = send(
        &app,
        Method::POST,
        "/select_tracks",
        Some(json!({"session_id": id, "audio_index": 1, "subtitle_index": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], id.as_str());

    let (_, body) = send(&app, Method::GET, &format!("/status?session_id={}", id), None).await;
    assert_eq!(body["state"]["selected_audio"], 1);
    assert_eq!(body["state"]["selected_subtitle"], 0);

    let (status, body) = send(
        &app,
        Method::POST,
        "/select_tracks",
        Some(json!({"session_id": id, "audio_index": "one"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "audio_index must be an integer or null");

    let (status, _) = send(
        &app,
        Method::POST,
        "/select_tracks",
        Some(json!({"session_id": id, "subtitle_index": -3})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tracks_endpoint() {
    let fixture = MediaFixture::new();
    let app = create_router(fixture.state(&fixture.ffmpeg("true")));

    let (status, body) = send(&app, Method::GET, "/tracks?path=movie.mkv", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["duration"], 5400.0);
    let audio = body["audio"].as_array().unwrap();
    assert_eq!(audio.len(), 2);
    assert_eq!(audio[0]["index"], 0);
    assert_eq!(audio[0]["title"], "Surround 5.1");
    assert_eq!(audio[1]["index"], 1);
    assert_eq!(audio[1]["language"], "fre");
    let subtitles = body["subtitles"].as_array().unwrap();
    assert_eq!(subtitles[1]["language"], "und");
    assert_eq!(subtitles[1]["title"], "Subtitle track 1");

    let (status, _) = send(&app, Method::GET, "/tracks?path=missing.mkv", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // An existing file beside the media root, reached by traversal and directly
    let outside = tempfile::NamedTempFile::new_in(fixture.media.path().parent().unwrap()).unwrap();
    let name = outside.path().file_name().unwrap().to_str().unwrap();
    let traversal = format!("/tracks?path=../{}", name);
    let (status, body) = send(&app, Method::GET, &traversal, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access denied");

    let absolute = format!("/tracks?path={}", outside.path().display());
    let (status, _) = send(&app, Method::GET, &absolute, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_tracks_with_static_inspector() {
    let fixture = MediaFixture::new();
    let app = create_router(fixture.state_with_static_inspector(&fixture.ffmpeg("true")));
    let uri = format!("/tracks?path={}", fixture.movie().display());

    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subtitles"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_stream_requires_session() {
    let fixture = MediaFixture::new();
    let app = create_router(fixture.state(&fixture.ffmpeg("true")));

    let (status, _) = send(&app, Method::GET, "/stream?path=movie.mkv", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::GET,
        "/stream?path=movie.mkv&session_id=unknown",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, "/stream?path=nope.mkv&session_id=x", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stream_with_missing_transcoder() {
    let fixture = MediaFixture::new();
    let state = fixture.state(std::path::Path::new("/nonexistent/ffmpeg"));
    let id = state.create_session();
    let app = create_router(state);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/stream?path=movie.mkv&session_id={}", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("ffmpeg unavailable"));
}

#[tokio::test]
async fn test_stream_delivers_transcoder_output() {
    let fixture = MediaFixture::new();
    let state = fixture.state(&fixture.ffmpeg("printf 'fragmented-mp4-bytes'"));
    let (id, _) = state.sessions.apply(None, &crate::session::PlaybackCommand::Play);
    let addr = serve(state).await;

    let response = reqwest::get(format!(
        "http://{}/stream?path=movie.mkv&session_id={}",
        addr, id
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "video/mp4"
    );
    assert_eq!(response.text().await.unwrap(), "fragmented-mp4-bytes");
}

#[tokio::test]
async fn test_client_disconnect_stops_transcoder() {
    let fixture = MediaFixture::new();
    let pid_file = fixture.tools.path().join("ffmpeg.pid");
    let ffmpeg = fixture.ffmpeg(&format!(
        "echo $$ > '{}'; while :; do printf frame; sleep 0.05; done",
        pid_file.display()
    ));
    let state = fixture.state(&ffmpeg);
    let (id, _) = state.sessions.apply(None, &crate::session::PlaybackCommand::Play);
    let addr = serve(state).await;

    let mut response = reqwest::get(format!(
        "http://{}/stream?path=movie.mkv&session_id={}",
        addr, id
    ))
    .await
    .unwrap();
    let first = response.chunk().await.unwrap().unwrap();
    assert!(first.starts_with(b"frame"));

    let pid: u32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(fixtures::process_exists(pid));
    drop(response);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while fixtures::process_exists(pid) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "transcoder still running after disconnect"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
