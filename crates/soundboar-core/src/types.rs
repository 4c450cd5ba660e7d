//! Core domain types for soundboar.

pub mod event;
pub mod state;
pub mod track;

pub use event::Event;
pub use state::{LastError, TransportState};
pub use track::TrackRef;
