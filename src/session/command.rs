//! Playback commands and the transitions they drive
//!
//! Transport requests arrive loosely typed (numbers may be strings, fields may
//! be missing). They are validated once into a [`PlaybackCommand`]; applying a
//! validated command to a record cannot fail.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{PlaybackError, Result};

use super::record::{
    seconds_between, PlaybackRecord, SubtitleSelection, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE,
};

/// Raw control request as sent by a client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlRequest {
    pub action: Option<String>,
    pub session_id: Option<String>,
    pub time: Option<Value>,
    pub rate: Option<Value>,
    pub audio_index: Option<Value>,
    pub subtitle_index: Option<Value>,
}

/// A validated playback command
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    Seek(f64),
    SetRate(f64),
    SelectTracks {
        audio: Option<u32>,
        subtitle: SubtitleSelection,
    },
}

impl PlaybackCommand {
    /// Validate a control request carrying an `action` field
    pub fn from_request(request: &ControlRequest) -> Result<Self> {
        let action = request
            .action
            .as_deref()
            .ok_or_else(|| PlaybackError::invalid("action field is required"))?;
        Self::parse(action, request)
    }

    /// Validate the fields `action` needs out of `request`
    pub fn parse(action: &str, request: &ControlRequest) -> Result<Self> {
        match action {
            "play" => Ok(PlaybackCommand::Play),
            "pause" => Ok(PlaybackCommand::Pause),
            "seek" => {
                let time = request
                    .time
                    .as_ref()
                    .ok_or_else(|| PlaybackError::invalid("seek action requires time field"))?;
                let secs = numeric(time)
                    .ok_or_else(|| PlaybackError::invalid("time must be a number"))?;
                Ok(PlaybackCommand::Seek(secs))
            }
            "set_rate" => {
                let rate = request
                    .rate
                    .as_ref()
                    .ok_or_else(|| PlaybackError::invalid("set_rate action requires rate field"))?;
                let rate =
                    numeric(rate).ok_or_else(|| PlaybackError::invalid("rate must be a number"))?;
                validate_rate(rate)?;
                Ok(PlaybackCommand::SetRate(rate))
            }
            "select_tracks" => Self::select_tracks(
                request.audio_index.as_ref(),
                request.subtitle_index.as_ref(),
            ),
            other => Err(PlaybackError::UnknownCommand(other.to_string())),
        }
    }

    /// Validate a track selection; absent fields clear the selection
    pub fn select_tracks(audio: Option<&Value>, subtitle: Option<&Value>) -> Result<Self> {
        let audio = match audio {
            None => None,
            Some(value) => {
                let idx = integer(value).ok_or_else(|| {
                    PlaybackError::invalid("audio_index must be an integer or null")
                })?;
                let idx = u32::try_from(idx)
                    .map_err(|_| PlaybackError::invalid("audio_index must be non-negative"))?;
                Some(idx)
            }
        };

        let subtitle = match subtitle {
            None => SubtitleSelection::Unset,
            Some(value) => {
                let idx = integer(value).ok_or_else(|| {
                    PlaybackError::invalid("subtitle_index must be an integer or null")
                })?;
                match idx {
                    -1 => SubtitleSelection::Disabled,
                    i if i < -1 => {
                        return Err(PlaybackError::invalid("subtitle_index must be >= -1"))
                    }
                    i => SubtitleSelection::Track(u32::try_from(i).map_err(|_| {
                        PlaybackError::invalid("subtitle_index is out of range")
                    })?),
                }
            }
        };

        Ok(PlaybackCommand::SelectTracks { audio, subtitle })
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlaybackCommand::Play => "play",
            PlaybackCommand::Pause => "pause",
            PlaybackCommand::Seek(_) => "seek",
            PlaybackCommand::SetRate(_) => "set_rate",
            PlaybackCommand::SelectTracks { .. } => "select_tracks",
        }
    }
}

/// Reject rates the transcoder cannot honour
pub fn validate_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() {
        return Err(PlaybackError::invalid(format!(
            "rate must be a number; requested {}",
            rate
        )));
    }
    if rate <= 0.0 {
        return Err(PlaybackError::invalid(format!(
            "rate must be positive; requested {}x",
            rate
        )));
    }
    if !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&rate) {
        return Err(PlaybackError::invalid(format!(
            "playback rate must be between {} and {}; requested {}x",
            MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE, rate
        )));
    }
    Ok(())
}

/// JSON numbers and numeric strings, finite only
fn numeric(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// JSON integers only; `1.0` and `"1"` are rejected
fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

impl PlaybackRecord {
    /// Apply a validated command at wall-clock moment `now`
    pub fn apply(&mut self, command: &PlaybackCommand, now: DateTime<Utc>) {
        match command {
            PlaybackCommand::Play => self.play(now),
            PlaybackCommand::Pause => self.pause(now),
            PlaybackCommand::Seek(secs) => self.seek(*secs),
            PlaybackCommand::SetRate(rate) => self.set_rate(*rate),
            PlaybackCommand::SelectTracks { audio, subtitle } => {
                self.selected_audio = *audio;
                self.selected_subtitle = *subtitle;
            }
        }
        self.touch(now);
    }

    fn play(&mut self, now: DateTime<Utc>) {
        if let Some(paused_at) = self.pause_start_time.take() {
            self.total_paused_duration += seconds_between(paused_at, now);
        }
        if self.stream_start_time.is_none() {
            self.stream_start_time = Some(now);
            self.stream_initial_seek = self.current_time;
            self.total_paused_duration = 0.0;
        }
        self.is_playing = true;
    }

    /// A redundant pause keeps the original pause anchor.
    fn pause(&mut self, now: DateTime<Utc>) {
        self.is_playing = false;
        if self.pause_start_time.is_none() {
            self.pause_start_time = Some(now);
        }
    }

    fn seek(&mut self, secs: f64) {
        self.current_time = secs;
        self.stream_start_time = None;
        self.pause_start_time = None;
        self.total_paused_duration = 0.0;
    }

    fn set_rate(&mut self, rate: f64) {
        self.playback_rate = rate;
    }
}
