//! Session module
//!
//! This module owns per-viewer playback state:
//! - Session registry with creation, lookup and expiry sweeps
//! - The playback record and its play/pause/seek/rate transitions
//! - Wall-clock position estimation

pub mod command;
pub mod position;
pub mod record;
pub mod store;

pub use command::{ControlRequest, PlaybackCommand};
pub use position::{estimate, EstimatedPosition};
pub use record::{PlaybackRecord, SubtitleSelection, TransportMode};
pub use store::{start_expiry_task, SessionId, SessionStore};
