//! Position estimation
//!
//! Derives where playback should be right now from the record's wall-clock
//! anchors, without asking the transcoder.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::record::{seconds_between, PlaybackRecord, TransportMode};

/// Result of estimating a session's position at some instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EstimatedPosition {
    /// Best estimate of the playback position in seconds
    pub position: f64,
    /// True when `position` was extrapolated from the stream anchor
    pub computed: bool,
    /// Seconds the current pause has lasted, when paused
    pub pause_elapsed: Option<f64>,
}

/// Estimate the playback position of `record` at `now`.
///
/// Deterministic in `(record, now)` and read-only.
pub fn estimate(record: &PlaybackRecord, now: DateTime<Utc>) -> EstimatedPosition {
    match record.mode() {
        TransportMode::Advancing { since } => {
            let elapsed = seconds_between(since, now) - record.total_paused_duration;
            EstimatedPosition {
                position: record.stream_initial_seek + elapsed * record.playback_rate,
                computed: true,
                pause_elapsed: None,
            }
        }
        TransportMode::Paused { since } => EstimatedPosition {
            position: record.current_time,
            computed: false,
            pause_elapsed: Some(seconds_between(since, now)),
        },
        TransportMode::Idle => EstimatedPosition {
            position: record.current_time,
            computed: false,
            pause_elapsed: None,
        },
    }
}
