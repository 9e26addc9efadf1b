use thiserror::Error;

/// Main error type for the playback server
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Media not found: {0}")]
    MediaNotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("{tool} unavailable: {reason}")]
    UnavailableExternalTool { tool: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlaybackError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        PlaybackError::InvalidArgument(msg.into())
    }

    pub(crate) fn tool(tool: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        PlaybackError::UnavailableExternalTool {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that mean "the thing you asked for does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PlaybackError::SessionNotFound(_) | PlaybackError::MediaNotFound(_)
        )
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PlaybackError>;
