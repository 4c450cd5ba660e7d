//! Transport state and the last-error slot.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of the playback engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    /// Created but never had anything to play.
    #[default]
    Initiated,
    /// Opening a file.
    Opening,
    /// Buffering the current file.
    Buffering,
    /// Playing the current file.
    Playing,
    /// Paused inside a file.
    Paused,
    /// Stopped.
    Stopped,
    /// Reached the end of the current file.
    Ended,
    /// The engine reported an error.
    Error,
}

impl TransportState {
    /// All states, ordered by their native engine code.
    pub const ALL: [Self; 8] = [
        Self::Initiated,
        Self::Opening,
        Self::Buffering,
        Self::Playing,
        Self::Paused,
        Self::Stopped,
        Self::Ended,
        Self::Error,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Opening => "opening",
            Self::Buffering => "buffering",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Ended => "ended",
            Self::Error => "error",
        }
    }

    /// Whether audio is being produced or about to be.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Opening | Self::Buffering | Self::Playing)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The most recent error: when it happened and what it said.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastError {
    pub at: DateTime<Local>,
    pub message: String,
}

impl LastError {
    /// Stamp `message` with the current local time.
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_default_is_initiated() {
        assert_eq!(TransportState::default(), TransportState::Initiated);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&TransportState::Buffering).unwrap_or_default();
        assert_eq!(json, "\"buffering\"");
        assert_eq!(TransportState::Ended.to_string(), "ended");
    }

    #[test]
    fn test_native_order() {
        assert_eq!(TransportState::ALL[3], TransportState::Playing);
        assert_eq!(TransportState::ALL[7], TransportState::Error);
    }
}
