//! Error types for soundboar.

use thiserror::Error;

/// Result type alias using soundboar's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for soundboar.
#[derive(Error, Debug)]
pub enum Error {
    // Caller errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    // Playback engine errors
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    #[error("Audio output error: {0}")]
    AudioOutput(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if the caller can fix this error by changing the request.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::NotFound(_)
                | Self::AlreadyExists(_)
                | Self::UnsupportedMediaType(_)
        )
    }

    /// Returns true if this error originates in the playback engine.
    pub const fn is_engine_error(&self) -> bool {
        matches!(
            self,
            Self::Engine(_) | Self::AudioDecode(_) | Self::AudioOutput(_)
        )
    }
}
