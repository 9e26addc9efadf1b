//! Per-session playback record
//!
//! A `PlaybackRecord` describes one viewer's transport: where playback was
//! last commanded to, how fast it runs, which tracks are selected and the
//! wall-clock anchors used to estimate the live position.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Lowest playback rate the transcoder's tempo filter handles natively
pub const MIN_PLAYBACK_RATE: f64 = 0.5;

/// Highest playback rate the transcoder's tempo filter handles natively
pub const MAX_PLAYBACK_RATE: f64 = 2.0;

/// Subtitle choice for a session.
///
/// On the wire this is `null` (unset), `-1` (explicitly no subtitles) or a
/// stream-relative subtitle index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubtitleSelection {
    #[default]
    Unset,
    Disabled,
    Track(u32),
}

impl SubtitleSelection {
    /// Stream-relative index to burn in, if any
    pub fn track(&self) -> Option<u32> {
        match self {
            SubtitleSelection::Track(idx) => Some(*idx),
            _ => None,
        }
    }

    /// Wire representation
    pub fn as_index(&self) -> Option<i64> {
        match self {
            SubtitleSelection::Unset => None,
            SubtitleSelection::Disabled => Some(-1),
            SubtitleSelection::Track(idx) => Some(i64::from(*idx)),
        }
    }
}

impl Serialize for SubtitleSelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_index().serialize(serializer)
    }
}

/// Which of the three mutually exclusive transport modes a record is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// A stream is anchored and wall-clock time advances the position
    Advancing { since: DateTime<Utc> },
    /// Held; the pause started at `since`
    Paused { since: DateTime<Utc> },
    /// Neither advancing nor paused; the position is simply `current_time`
    Idle,
}

/// Mutable playback state owned by a single session
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackRecord {
    pub is_playing: bool,
    /// Last known/commanded position in seconds
    pub current_time: f64,
    pub playback_rate: f64,
    /// Stream-relative audio track index
    pub selected_audio: Option<u32>,
    pub selected_subtitle: SubtitleSelection,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// When the active stream started playing since the last seek
    pub stream_start_time: Option<DateTime<Utc>>,
    /// When the current pause began
    pub pause_start_time: Option<DateTime<Utc>>,
    /// Seconds spent paused within the current stream segment
    pub total_paused_duration: f64,
    /// `current_time` captured when the stream was anchored
    pub stream_initial_seek: f64,
}

impl PlaybackRecord {
    /// Fresh record: stopped at zero, normal speed, nothing selected
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            playback_rate: 1.0,
            selected_audio: None,
            selected_subtitle: SubtitleSelection::Unset,
            created_at: now,
            last_activity: now,
            stream_start_time: None,
            pause_start_time: None,
            total_paused_duration: 0.0,
            stream_initial_seek: 0.0,
        }
    }

    pub fn mode(&self) -> TransportMode {
        match (self.stream_start_time, self.pause_start_time) {
            (_, Some(paused_at)) => TransportMode::Paused { since: paused_at },
            (Some(start), None) if self.is_playing => TransportMode::Advancing { since: start },
            _ => TransportMode::Idle,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Seconds since creation
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        seconds_between(self.created_at, now)
    }

    /// Seconds since the last command or delivered chunk
    pub fn idle_secs(&self, now: DateTime<Utc>) -> f64 {
        seconds_between(self.last_activity, now)
    }
}

/// Fractional seconds from `earlier` to `later`, never negative
pub(crate) fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let delta = later - earlier;
    let secs = match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    };
    secs.max(0.0)
}
