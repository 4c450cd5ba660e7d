//! Playlist slots detached from the player.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use soundboar_core::{Engine, TrackRef};

use crate::playlist::Slot;

/// Duration of the file at `location` in milliseconds, as the engine
/// reports it.
pub(crate) fn parse_millis(engine: &dyn Engine, location: &Path) -> Option<u64> {
    engine
        .parse_duration(location)
        .and_then(|d| u64::try_from(d.as_millis()).ok())
}

/// One slot copied out of the playlist.
///
/// The duration cache is shared with the slot it came from, so a duration
/// resolved here is not parsed again by the player.
#[derive(Clone)]
pub struct SlotView {
    index: usize,
    track: TrackRef,
    current: bool,
    duration: Arc<OnceLock<Option<u64>>>,
    engine: Arc<dyn Engine>,
}

impl SlotView {
    pub(crate) fn new(index: usize, slot: &Slot, current: bool, engine: Arc<dyn Engine>) -> Self {
        Self {
            index,
            track: slot.track().clone(),
            current,
            duration: slot.duration_cell(),
            engine,
        }
    }

    /// Playlist index at the time the view was taken.
    pub const fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> &str {
        self.track.id()
    }

    pub fn location(&self) -> &Path {
        self.track.location()
    }

    /// Whether the slot was the current one.
    pub const fn is_current(&self) -> bool {
        self.current
    }

    pub fn cached_duration(&self) -> Option<Option<u64>> {
        self.duration.get().copied()
    }

    /// Duration in milliseconds. Parses the file the first time, which
    /// may block on disk I/O.
    pub fn duration(&self) -> Option<u64> {
        *self
            .duration
            .get_or_init(|| parse_millis(&*self.engine, self.track.location()))
    }
}

impl fmt::Debug for SlotView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotView")
            .field("index", &self.index)
            .field("track", &self.track)
            .field("current", &self.current)
            .field("duration", &self.cached_duration())
            .finish_non_exhaustive()
    }
}
