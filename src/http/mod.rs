//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Axum router with session, control, status, track and stream endpoints
//! - JSON error responses mapped from playback errors
//! - Streaming MP4 responses fed by the transcoder pipeline
//! - CORS middleware

pub mod handlers;
pub mod routes;

pub use routes::create_router;
