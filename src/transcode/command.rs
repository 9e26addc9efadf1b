//! Transcoder invocation
//!
//! Maps a snapshot of a session to the ffmpeg argument list that produces a
//! fragmented MP4 on stdout. Pure: nothing here reads session state or
//! spawns processes.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::OutputProfile;
use crate::session::{PlaybackRecord, SubtitleSelection};

/// Native range of the `atempo` audio filter
pub const ATEMPO_RANGE: std::ops::RangeInclusive<f64> = 0.5..=2.0;

/// Movie flags for a progressively writable, pipe-friendly MP4
const FRAGMENTED_MOVFLAGS: &str = "frag_keyframe+empty_moov+default_base_moof";

/// The session fields a transcode depends on, captured at stream start
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeRequest {
    pub media_path: PathBuf,
    pub start_time: f64,
    pub rate: f64,
    pub audio: Option<u32>,
    pub subtitle: SubtitleSelection,
}

impl TranscodeRequest {
    pub fn new(media_path: impl Into<PathBuf>) -> Self {
        Self {
            media_path: media_path.into(),
            start_time: 0.0,
            rate: 1.0,
            audio: None,
            subtitle: SubtitleSelection::Unset,
        }
    }

    /// Snapshot the fields of `record` needed to start a transcode
    pub fn from_record(media_path: impl Into<PathBuf>, record: &PlaybackRecord) -> Self {
        Self {
            media_path: media_path.into(),
            start_time: record.current_time,
            rate: record.playback_rate,
            audio: record.selected_audio,
            subtitle: record.selected_subtitle,
        }
    }
}

/// Build the transcoder arguments (program name excluded) for `request`
pub fn build_command(request: &TranscodeRequest, profile: &OutputProfile) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(32);
    let mut push = |a: &str| args.push(a.into());
    push("-hide_banner");
    push("-loglevel");
    push("error");

    if request.start_time > 0.0 {
        push("-ss");
        push(&request.start_time.to_string());
    }

    args.push("-i".into());
    args.push(request.media_path.clone().into_os_string());

    let mut video_filters: Vec<String> = Vec::new();
    let mut audio_filters: Vec<String> = Vec::new();

    let rate = request.rate;
    if !rate.is_finite() || rate <= 0.0 {
        tracing::warn!(rate, "Ignoring unusable playback rate");
    } else if rate != 1.0 {
        video_filters.push(format!("setpts=PTS/{}", rate));
        if ATEMPO_RANGE.contains(&rate) {
            audio_filters.push(format!("atempo={}", rate));
        } else {
            tracing::warn!(rate, "Rate outside atempo range (0.5-2.0); applying video only");
        }
    }

    if let Some(track) = request.subtitle.track() {
        match subtitle_filter(&request.media_path, track) {
            Some(filter) => {
                tracing::info!(track, "Subtitle track will be burned into video");
                video_filters.push(filter);
            }
            None => tracing::warn!(
                track,
                path = %request.media_path.display(),
                "Cannot express media path in a filter graph; streaming without subtitles"
            ),
        }
    }

    let audio = request.audio.unwrap_or(0);
    let mut push = |a: &str| args.push(a.into());
    push("-map");
    push("0:v:0");
    push("-map");
    push(&format!("0:a:{}", audio));

    push("-c:v");
    push(&profile.video_codec);
    push("-preset");
    push(&profile.preset);
    push("-crf");
    push(&profile.crf.to_string());
    push("-c:a");
    push(&profile.audio_codec);
    push("-b:a");
    push(&profile.audio_bitrate);

    if !video_filters.is_empty() {
        push("-vf");
        push(&video_filters.join(","));
    }
    if !audio_filters.is_empty() {
        push("-af");
        push(&audio_filters.join(","));
    }

    push("-f");
    push("mp4");
    push("-movflags");
    push(FRAGMENTED_MOVFLAGS);
    push("pipe:1");

    args
}

/// `subtitles=<path>:si=<track>`, or `None` when the path is not UTF-8
fn subtitle_filter(media_path: &Path, track: u32) -> Option<String> {
    let path = media_path.to_str()?;
    Some(format!("subtitles={}:si={}", escape_filter_path(path), track))
}

/// Escape a path for use as a filter option inside a filter graph.
///
/// Two levels: the option value (`\ ' :`) and then the graph (`\ ' [ ] , ;`).
fn escape_filter_path(path: &str) -> String {
    fn escape(s: &str, special: &[char]) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            if special.contains(&c) {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }
    let value = escape(path, &['\\', '\'', ':']);
    escape(&value, &['\\', '\'', '[', ']', ',', ';'])
}
