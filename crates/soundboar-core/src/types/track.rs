//! Track reference type representing one playlist slot.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A playable audio item: an opaque identifier plus its resolved location.
///
/// Every slot gets a fresh identifier, so the same file can be queued
/// several times and each occurrence stays addressable on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TrackRef {
    /// Slot identifier, unique within a playlist.
    id: String,
    /// Where the engine finds the audio.
    location: PathBuf,
}

impl TrackRef {
    /// Create a reference with a freshly generated identifier.
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), location)
    }

    /// Create a reference with a caller-chosen identifier.
    pub fn with_id(id: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Whether this reference points at `location`.
    pub fn is_at(&self, location: &Path) -> bool {
        self.location == location
    }

    /// File stem used as a display name.
    pub fn name(&self) -> Option<&str> {
        self.location.file_stem().and_then(|s| s.to_str())
    }
}
