//! Transcoding module
//!
//! This module drives the external transcoder for a stream:
//! - Argument construction from a session snapshot
//! - Process ownership with graceful then forced termination
//! - The play/pause-gated pipeline feeding bytes to a client

pub mod command;
pub mod pipeline;
pub mod process;

pub use command::{build_command, TranscodeRequest};
pub use pipeline::{ByteStream, ExitReason, PipelineController, PipelineReport, PipelineState};
pub use process::{TerminationKind, TranscoderProcess};
