//! The player: playlist owner and transport state machine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use soundboar_core::{Engine, Error, LastError, NativeEvent, Result, TrackRef, TransportState};
use tracing::{debug, info, trace, warn};

use crate::broadcaster::{EventBroadcaster, EventStream};
use crate::playlist::{Playlist, Slot};
use crate::view::{parse_millis, SlotView};

/// Transport state for each native state code, indexed by code.
const STATE_MAPPING: [TransportState; 8] = TransportState::ALL;

/// What to take out of the playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveTarget {
    /// Slot index; negative values count from the end.
    Index(isize),
    /// First slot playing this file.
    Location(PathBuf),
    /// Slot with this identifier.
    Id(String),
}

impl fmt::Display for RemoveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "index {index}"),
            Self::Location(location) => write!(f, "file {}", location.display()),
            Self::Id(id) => write!(f, "identifier {id}"),
        }
    }
}

/// Playlist-driven player on top of a playback [`Engine`].
///
/// Playlist mutations happen on the caller's thread. The engine reports
/// back through its callback, which only feeds the event broadcaster and
/// the last-error slot.
pub struct Player {
    playlist: Playlist,
    engine: Arc<dyn Engine>,
    events: EventBroadcaster,
    last_error: Arc<Mutex<Option<LastError>>>,
}

impl Player {
    pub fn new(engine: impl Engine + 'static) -> Self {
        Self::with_broadcaster(Arc::new(engine), EventBroadcaster::new())
    }

    /// Build a player that publishes on an existing broadcaster.
    pub fn with_broadcaster(engine: Arc<dyn Engine>, events: EventBroadcaster) -> Self {
        let last_error = Arc::new(Mutex::new(None));

        let callback_events = events.clone();
        let callback_error = Arc::clone(&last_error);
        engine.on_event(Box::new(move |native: NativeEvent| {
            if let NativeEvent::EncounteredError(message) = &native {
                warn!("Engine error: {message}");
                *callback_error.lock() = Some(LastError::now(message.clone()));
            }

            match native.normalized() {
                Some(event) => callback_events.emit(event),
                None => trace!("Dropping native event {native:?}"),
            }
        }));

        Self {
            playlist: Playlist::new(),
            engine,
            events,
            last_error,
        }
    }

    /// Insert `location` right after the current slot (or at the end when
    /// nothing was played) and start playing it.
    pub fn play(&mut self, location: impl Into<PathBuf>) -> String {
        let track = TrackRef::new(location);
        let id = track.id().to_string();
        let index = self.playlist.insert(self.playlist.play_position(), track);
        info!("Playing slot {index} ({id})");
        self.open_at(index);
        id
    }

    /// Add `location` to the end, or before `index` when given (negative
    /// indices count from the end). Playback is not affected.
    pub fn add(&mut self, location: impl Into<PathBuf>, index: Option<isize>) -> String {
        let track = TrackRef::new(location);
        let id = track.id().to_string();
        let index = match index {
            Some(index) => {
                let point = self.playlist.insertion_point(index);
                self.playlist.insert(point, track)
            }
            None => self.playlist.push(track),
        };
        debug!("Added slot {index} ({id})");
        id
    }

    /// Remove one slot. A miss is recorded as the last error.
    pub fn remove(&mut self, target: RemoveTarget) -> Option<TrackRef> {
        let index = match &target {
            RemoveTarget::Index(index) => self.playlist.resolve_index(*index),
            RemoveTarget::Location(location) => self.playlist.position_of(location),
            RemoveTarget::Id(id) => self.playlist.position_of_id(id),
        };

        match index.map(|index| self.playlist.remove_at(index)) {
            Some(Ok(track)) => {
                debug!("Removed {target}");
                Some(track)
            }
            Some(Err(e)) => {
                self.record_error(format!("remove: {e}"));
                None
            }
            None => {
                self.record_error(format!("remove: {target} not found"));
                None
            }
        }
    }

    /// Empty the playlist. The current file keeps playing.
    pub fn clear(&mut self) {
        debug!("Clearing {} slots", self.playlist.len());
        self.playlist.clear();
    }

    /// Stop playback and clear the playlist.
    pub fn stop(&mut self) {
        if let Err(e) = self.engine.stop() {
            self.record_error(format!("stop: {e}"));
        }
        self.clear();
    }

    /// Pause (`Some(true)`), resume (`Some(false)`) or toggle (`None`).
    /// Returns whether a pause was requested.
    pub fn pause(&mut self, pause: Option<bool>) -> bool {
        let pause = pause.unwrap_or_else(|| self.state() == TransportState::Playing);
        if let Err(e) = self.engine.set_pause(pause) {
            self.record_error(format!("pause: {e}"));
        }
        pause
    }

    /// Play the next slot. Returns `false` at the end of the playlist.
    #[allow(clippy::should_implement_trait)] // Not an iterator
    pub fn next(&mut self) -> bool {
        match self.playlist.next_index() {
            Some(index) => {
                self.open_at(index);
                true
            }
            None => {
                debug!("No next slot");
                false
            }
        }
    }

    /// Play the previous slot. Returns `false` at the start of the playlist.
    pub fn previous(&mut self) -> bool {
        match self.playlist.previous_index() {
            Some(index) => {
                self.open_at(index);
                true
            }
            None => {
                debug!("No previous slot");
                false
            }
        }
    }

    /// Seek the current file back to its start.
    pub fn restart(&mut self) {
        if let Err(e) = self.engine.seek(0.0) {
            self.record_error(format!("restart: {e}"));
        }
    }

    /// Continue with the next slot once the current one has ended.
    pub fn advance_on_end(&mut self) -> bool {
        self.state() == TransportState::Ended
            && self.playlist.has_played()
            && self.playlist.next_index().is_some()
            && self.next()
    }

    /// Identifier of the slot at `index`, or `relative` to the current one.
    pub fn identifier(&self, index: Option<isize>, relative: Option<isize>) -> Result<Option<String>> {
        let slot = self.playlist.lookup(index, relative)?;
        Ok(slot
            .and_then(|i| self.playlist.get(i))
            .map(|s| s.id().to_string()))
    }

    /// Duration in milliseconds of the slot at `index`, or `relative` to the
    /// current one.
    pub fn duration(&self, index: Option<isize>, relative: Option<isize>) -> Result<Option<u64>> {
        let slot = self.playlist.lookup(index, relative)?;
        Ok(slot.and_then(|i| self.slot_duration(i)))
    }

    pub fn next_identifier(&self) -> Option<String> {
        self.identifier(None, Some(1)).ok().flatten()
    }

    pub fn previous_identifier(&self) -> Option<String> {
        self.identifier(None, Some(-1)).ok().flatten()
    }

    pub fn next_duration(&self) -> Option<u64> {
        self.duration(None, Some(1)).ok().flatten()
    }

    pub fn previous_duration(&self) -> Option<u64> {
        self.duration(None, Some(-1)).ok().flatten()
    }

    /// Identifiers of slots `start..=end`, clamped to the playlist.
    pub fn identifiers_from_to(
        &self,
        start: isize,
        end: isize,
    ) -> impl Iterator<Item = &str> + Clone + '_ {
        self.playlist.slots()[self.playlist.span(start, end)]
            .iter()
            .map(Slot::id)
    }

    /// Durations (milliseconds) of slots `start..=end`, clamped to the
    /// playlist. Unparsed files are parsed as the iterator reaches them.
    pub fn durations_from_to(
        &self,
        start: isize,
        end: isize,
    ) -> impl Iterator<Item = Option<u64>> + Clone + '_ {
        self.playlist
            .span(start, end)
            .map(move |index| self.slot_duration(index))
    }

    pub fn all_identifiers(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.identifiers_from_to(0, isize::MAX)
    }

    pub fn all_durations(&self) -> impl Iterator<Item = Option<u64>> + Clone + '_ {
        self.durations_from_to(0, isize::MAX)
    }

    /// Detached view of one slot, addressed like [`identifier`](Self::identifier).
    pub fn slot_view(&self, index: Option<isize>, relative: Option<isize>) -> Result<Option<SlotView>> {
        let slot = self.playlist.lookup(index, relative)?;
        Ok(slot.and_then(|i| self.view_of(i)))
    }

    /// Detached views of slots `start..=end`, clamped to the playlist.
    /// Their durations can be resolved after the player is unlocked.
    pub fn slot_views_from_to(&self, start: isize, end: isize) -> Vec<SlotView> {
        self.playlist
            .span(start, end)
            .filter_map(|index| self.view_of(index))
            .collect()
    }

    /// Snapshot of the playlist.
    pub fn entries(&self) -> Vec<TrackRef> {
        self.playlist.slots().iter().map(|s| s.track().clone()).collect()
    }

    /// Set the volume when `level` is given (clamped to 0-100), then report
    /// the current volume.
    pub fn volume(&mut self, level: Option<i32>) -> u8 {
        if let Some(level) = level {
            let clamped = level.clamp(0, 100) as u8;
            if i32::from(clamped) != level {
                debug!("Volume {level} clamped to {clamped}");
            }
            if let Err(e) = self.engine.set_volume(clamped) {
                self.record_error(format!("volume: {e}"));
            }
        }
        self.engine.volume()
    }

    /// Seek to a fraction of the current file when `fraction` is given
    /// (clamped to 0.0-1.0), then report the current position.
    pub fn position(&mut self, fraction: Option<f64>) -> Result<f64> {
        if let Some(fraction) = fraction {
            if fraction.is_nan() {
                return Err(Error::InvalidArgument("position must be a number".to_string()));
            }
            if let Err(e) = self.engine.seek(fraction.clamp(0.0, 1.0)) {
                self.record_error(format!("position: {e}"));
            }
        }
        Ok(self.engine.position())
    }

    pub fn state(&self) -> TransportState {
        let code = self.engine.state();
        STATE_MAPPING.get(usize::from(code)).copied().unwrap_or_else(|| {
            warn!("Unknown native state code {code}");
            TransportState::Error
        })
    }

    /// Current slot index.
    pub const fn index(&self) -> Option<usize> {
        self.playlist.current_index()
    }

    pub const fn size(&self) -> usize {
        self.playlist.len()
    }

    pub fn last_error(&self) -> Option<LastError> {
        self.last_error.lock().clone()
    }

    /// Subscribe to normalized events.
    pub fn on_event(&self) -> EventStream {
        self.events.subscribe()
    }

    /// Read-only view of the playlist.
    pub const fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub const fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    fn open_at(&mut self, index: usize) {
        let Some(location) = self
            .playlist
            .set_current(index)
            .map(|slot| slot.location().to_path_buf())
        else {
            return;
        };

        if let Err(e) = self.engine.open(&location) {
            self.record_error(format!("open {}: {e}", location.display()));
        }
    }

    fn slot_duration(&self, index: usize) -> Option<u64> {
        let engine = &*self.engine;
        self.playlist
            .get(index)?
            .duration_or_resolve(|location: &Path| parse_millis(engine, location))
    }

    fn view_of(&self, index: usize) -> Option<SlotView> {
        let slot = self.playlist.get(index)?;
        Some(SlotView::new(
            index,
            slot,
            self.playlist.current_index() == Some(index),
            Arc::clone(&self.engine),
        ))
    }

    fn record_error(&self, message: String) {
        warn!("{message}");
        *self.last_error.lock() = Some(LastError::now(message));
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("size", &self.playlist.len())
            .field("index", &self.playlist.current_index())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
