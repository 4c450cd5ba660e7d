//! Normalized player events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Something changed; subscribers re-query the player for details.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    StateChange,
    FileChange,
    VolumeChange,
    Error,
}

impl Event {
    pub const ALL: [Self; 4] = [
        Self::StateChange,
        Self::FileChange,
        Self::VolumeChange,
        Self::Error,
    ];

    /// Wire name sent to clients.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StateChange => "statechange",
            Self::FileChange => "filechange",
            Self::VolumeChange => "volumechange",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
