//! Axum router configuration

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::handlers::{
    control, create_session, get_session, health_check, select_tracks, status, stream, tracks,
    version_check,
};

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        // Health and version endpoints
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        // Sessions and playback control
        .route("/session", get(get_session).post(create_session))
        .route("/control", post(control))
        .route("/select_tracks", post(select_tracks))
        .route("/status", get(status))
        // Media
        .route("/tracks", get(tracks))
        .route("/stream", get(stream))
        // Middleware
        .layer(TraceLayer::new_for_http());

    if state.config.cors_enabled {
        router = router.layer(cors_layer());
    }

    router.with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}
