//! Track catalog
//!
//! Normalizes a media inspection report into audio and subtitle tracks
//! numbered relative to their own stream type. The transcoder addresses
//! tracks as `0:a:N` and `si=N`, so the global stream index is never exposed.

use serde::{Deserialize, Serialize};

/// Language reported when the stream carries no language tag
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// Structured inspection report, shaped like `ffprobe -print_format json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaReport {
    #[serde(default)]
    pub streams: Vec<StreamEntry>,
    pub format: Option<FormatEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamEntry {
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    #[serde(default)]
    pub tags: Option<StreamTags>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamTags {
    pub language: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatEntry {
    /// ffprobe prints the duration as a decimal string
    pub duration: Option<serde_json::Value>,
}

impl FormatEntry {
    fn duration_secs(&self) -> Option<f64> {
        let secs = match self.duration.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64()?,
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        secs.is_finite().then_some(secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioTrack {
    pub index: u32,
    pub codec: Option<String>,
    pub language: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleTrack {
    pub index: u32,
    pub codec: Option<String>,
    pub language: String,
    pub title: String,
}

/// Audio and subtitle tracks of one media file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackCatalog {
    pub audio: Vec<AudioTrack>,
    pub subtitles: Vec<SubtitleTrack>,
    pub duration: Option<f64>,
}

impl TrackCatalog {
    /// Catalog reported when inspection is unavailable
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_report(report: &MediaReport) -> Self {
        let mut catalog = TrackCatalog::empty();

        for stream in &report.streams {
            let tags = stream.tags.clone().unwrap_or_default();
            let language = tags
                .language
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| UNDETERMINED_LANGUAGE.to_string());

            match stream.codec_type.as_deref() {
                Some("audio") => {
                    let index = catalog.audio.len() as u32;
                    catalog.audio.push(AudioTrack {
                        index,
                        codec: stream.codec_name.clone(),
                        language,
                        title: tags
                            .title
                            .filter(|t| !t.is_empty())
                            .unwrap_or_else(|| format!("Audio track {}", index)),
                    });
                }
                Some("subtitle") => {
                    let index = catalog.subtitles.len() as u32;
                    catalog.subtitles.push(SubtitleTrack {
                        index,
                        codec: stream.codec_name.clone(),
                        language,
                        title: tags
                            .title
                            .filter(|t| !t.is_empty())
                            .unwrap_or_else(|| format!("Subtitle track {}", index)),
                    });
                }
                _ => {}
            }
        }

        catalog.duration = report.format.as_ref().and_then(FormatEntry::duration_secs);
        catalog
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_empty() && self.subtitles.is_empty()
    }
}
