//! # soundboar-player
//!
//! Playlist-driven player on top of a playback engine, plus the event
//! broadcaster that carries engine notifications to async subscribers.

pub mod broadcaster;
pub mod player;
pub mod playlist;
pub mod view;

#[cfg(test)]
mod testing;

pub use broadcaster::{EventBroadcaster, EventStream};
pub use player::{Player, RemoveTarget};
pub use playlist::{Playlist, Slot};
pub use view::SlotView;

/// A player shared between request handlers and background tasks.
pub type SharedPlayer = std::sync::Arc<parking_lot::Mutex<Player>>;
