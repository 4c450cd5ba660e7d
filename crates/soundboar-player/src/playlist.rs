//! Ordered playlist with a current-slot cursor.
//!
//! Pure data structure: no engine, no events. The [`crate::Player`] keeps
//! it in step with what the engine is playing.

use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use soundboar_core::{Error, Result, TrackRef};

/// One playlist entry.
#[derive(Debug)]
pub struct Slot {
    track: TrackRef,
    /// Duration in milliseconds, resolved on first request. Shared with
    /// snapshots so a duration parsed outside the player lands here too.
    duration: Arc<OnceLock<Option<u64>>>,
}

impl Slot {
    fn new(track: TrackRef) -> Self {
        Self {
            track,
            duration: Arc::new(OnceLock::new()),
        }
    }

    pub const fn track(&self) -> &TrackRef {
        &self.track
    }

    pub fn id(&self) -> &str {
        self.track.id()
    }

    pub fn location(&self) -> &Path {
        self.track.location()
    }

    /// Duration if it was resolved before.
    pub fn cached_duration(&self) -> Option<Option<u64>> {
        self.duration.get().copied()
    }

    /// Duration, resolving it with `resolve` the first time.
    pub fn duration_or_resolve(&self, resolve: impl FnOnce(&Path) -> Option<u64>) -> Option<u64> {
        *self
            .duration
            .get_or_init(|| resolve(self.track.location()))
    }

    pub(crate) fn duration_cell(&self) -> Arc<OnceLock<Option<u64>>> {
        Arc::clone(&self.duration)
    }
}

/// Where the playlist stands relative to what the engine plays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Cursor {
    /// Nothing from the playlist was played yet.
    #[default]
    Unset,
    /// The engine plays this slot.
    At(usize),
    /// The slot being played was removed from this index. Slots before it
    /// are behind the playhead, the slot now at the index is next in line.
    Removed(usize),
}

/// The playlist.
#[derive(Debug, Default)]
pub struct Playlist {
    slots: Vec<Slot>,
    cursor: Cursor,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn current(&self) -> Option<&Slot> {
        self.current_index().and_then(|i| self.slots.get(i))
    }

    /// Slot loaded into the engine. `None` before anything was played and
    /// after the playing slot was removed.
    pub const fn current_index(&self) -> Option<usize> {
        match self.cursor {
            Cursor::At(current) => Some(current),
            Cursor::Unset | Cursor::Removed(_) => None,
        }
    }

    /// Whether anything from the playlist has been played since it was
    /// last emptied.
    pub const fn has_played(&self) -> bool {
        !matches!(self.cursor, Cursor::Unset)
    }

    /// Where a track played right now goes: after the current slot, into
    /// the gap a removed current slot left, or at the end.
    pub const fn play_position(&self) -> usize {
        match self.cursor {
            Cursor::At(current) => current + 1,
            Cursor::Removed(gap) => gap,
            Cursor::Unset => self.slots.len(),
        }
    }

    pub const fn len(&self) -> usize {
        self.slots.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Append a track, returning its index.
    pub fn push(&mut self, track: TrackRef) -> usize {
        self.slots.push(Slot::new(track));
        self.slots.len() - 1
    }

    /// Insert a track before `index` (clamped to the end), returning the
    /// index it landed on. Leaves the cursor on the same slot; a slot
    /// inserted into the gap of a removed current slot is next in line.
    pub fn insert(&mut self, index: usize, track: TrackRef) -> usize {
        let index = index.min(self.slots.len());
        self.slots.insert(index, Slot::new(track));

        self.cursor = match self.cursor {
            Cursor::At(current) if index <= current => Cursor::At(current + 1),
            Cursor::Removed(gap) if index < gap => Cursor::Removed(gap + 1),
            cursor => cursor,
        };

        index
    }

    /// Insertion point for a possibly negative index; negative values
    /// count from the end, so `-1` inserts before the last slot.
    pub fn insertion_point(&self, index: isize) -> usize {
        if index < 0 {
            self.slots.len().saturating_sub(index.unsigned_abs())
        } else {
            index.unsigned_abs().min(self.slots.len())
        }
    }

    /// Existing slot for a possibly negative index; `-1` is the last slot.
    pub fn resolve_index(&self, index: isize) -> Option<usize> {
        let resolved = if index < 0 {
            self.slots.len().checked_sub(index.unsigned_abs())?
        } else {
            index.unsigned_abs()
        };
        (resolved < self.slots.len()).then_some(resolved)
    }

    /// First slot whose track lives at `location`.
    pub fn position_of(&self, location: &Path) -> Option<usize> {
        self.slots.iter().position(|s| s.track.is_at(location))
    }

    /// Slot carrying the identifier `id`.
    pub fn position_of_id(&self, id: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.id() == id)
    }

    /// Remove the slot at `index`.
    ///
    /// Removing a slot before the cursor shifts it down. Removing the
    /// current slot leaves a gap in its place: nothing is current, the slot
    /// that followed stays next in line and the one before stays previous.
    /// An emptied playlist forgets the cursor.
    pub fn remove_at(&mut self, index: usize) -> Result<TrackRef> {
        if index >= self.slots.len() {
            return Err(Error::NotFound(format!(
                "playlist index {index} (size {})",
                self.slots.len()
            )));
        }

        let slot = self.slots.remove(index);

        self.cursor = match self.cursor {
            _ if self.slots.is_empty() => Cursor::Unset,
            Cursor::At(current) if index < current => Cursor::At(current - 1),
            Cursor::At(current) if index == current => Cursor::Removed(current),
            Cursor::Removed(gap) if index < gap => Cursor::Removed(gap - 1),
            cursor => cursor,
        };

        Ok(slot.track)
    }

    /// Remove every slot.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.cursor = Cursor::Unset;
    }

    /// Point the cursor at `index`.
    pub fn set_current(&mut self, index: usize) -> Option<&Slot> {
        if index < self.slots.len() {
            self.cursor = Cursor::At(index);
            self.slots.get(index)
        } else {
            None
        }
    }

    /// Slot after the cursor. With no cursor, the first slot.
    pub fn next_index(&self) -> Option<usize> {
        let next = match self.cursor {
            Cursor::At(current) => current + 1,
            Cursor::Removed(gap) => gap,
            Cursor::Unset => 0,
        };
        (next < self.slots.len()).then_some(next)
    }

    /// Slot before the cursor.
    pub fn previous_index(&self) -> Option<usize> {
        match self.cursor {
            Cursor::At(current) | Cursor::Removed(current) => current.checked_sub(1),
            Cursor::Unset => None,
        }
    }

    /// Indices `[start, end]` clamped to the playlist; empty when the
    /// clamped range is inverted or outside the playlist.
    pub fn span(&self, start: isize, end: isize) -> Range<usize> {
        if self.slots.is_empty() || end < 0 {
            return 0..0;
        }
        let start = start.max(0).unsigned_abs();
        let end = end.unsigned_abs().min(self.slots.len() - 1);
        if start > end {
            return 0..0;
        }
        start..end + 1
    }

    /// Resolve an absolute or cursor-relative lookup.
    ///
    /// `index` addresses a slot directly; otherwise `relative` is applied
    /// to the cursor. Giving both is a caller error. Returns `None` when
    /// there is no cursor to be relative to or the slot does not exist.
    /// After the current slot was removed, `+1` is the slot that followed
    /// it and `-1` the one before; there is no slot at offset zero.
    pub fn lookup(&self, index: Option<isize>, relative: Option<isize>) -> Result<Option<usize>> {
        if index.is_some() && relative.is_some() {
            return Err(Error::InvalidArgument(
                "cannot specify both index and relative".to_string(),
            ));
        }

        let to_isize = |position: usize| {
            isize::try_from(position)
                .map_err(|_| Error::Internal("playlist cursor overflow".to_string()))
        };
        let relative = relative.unwrap_or(0);
        let target = match (index, self.cursor) {
            (Some(index), _) => index.saturating_add(relative),
            (None, Cursor::At(current)) => to_isize(current)?.saturating_add(relative),
            (None, Cursor::Removed(gap)) if relative > 0 => to_isize(gap)?.saturating_add(relative - 1),
            (None, Cursor::Removed(gap)) if relative < 0 => to_isize(gap)?.saturating_add(relative),
            (None, Cursor::Removed(_) | Cursor::Unset) => return Ok(None),
        };

        if target < 0 {
            return Ok(None);
        }
        let target = target.unsigned_abs();
        Ok((target < self.slots.len()).then_some(target))
    }
}
