//! Playback server
//!
//! Per-session playback control for on-demand transcoded streams: sessions
//! track position, rate, play/pause and track selection against wall-clock
//! time, and each stream request drives one ffmpeg process whose output is
//! delivered only while its session is playing.

pub mod config;
pub mod config_file;
pub mod error;
pub mod http;
pub mod media_path;
pub mod session;
pub mod state;
pub mod tracks;
pub mod transcode;

#[cfg(test)]
mod integration;

pub use error::{PlaybackError, Result};
