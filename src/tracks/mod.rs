//! Track discovery
//!
//! - Media inspection through an external prober
//! - Stream-relative audio/subtitle catalog

pub mod catalog;
pub mod probe;

pub use catalog::{AudioTrack, MediaReport, SubtitleTrack, TrackCatalog};
pub use probe::{discover_tracks, FfprobeInspector, MediaInspector};
