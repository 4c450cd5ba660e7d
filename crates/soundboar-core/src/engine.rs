//! Contract between the player and a playback engine.
//!
//! An engine plays one file at a time and reports what it is doing through
//! a callback that fires on the engine's own thread. The player owns the
//! playlist and drives the engine through this trait, so a different audio
//! backend only has to implement [`Engine`].

use std::path::Path;
use std::time::Duration;

use crate::{Event, Result};

/// Native state codes, in the order of [`crate::TransportState::ALL`].
pub mod state_code {
    pub const IDLE: u8 = 0;
    pub const OPENING: u8 = 1;
    pub const BUFFERING: u8 = 2;
    pub const PLAYING: u8 = 3;
    pub const PAUSED: u8 = 4;
    pub const STOPPED: u8 = 5;
    pub const ENDED: u8 = 6;
    pub const ERROR: u8 = 7;
}

/// Notification raised by an engine.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    /// A new file became the engine's current media.
    MediaChanged,
    Opening,
    /// Buffer fill in percent.
    Buffering(f32),
    Playing,
    Paused,
    Stopped,
    EndReached,
    EncounteredError(String),
    /// Volume changed to the given level (0-100).
    AudioVolume(u8),
    /// Position as a fraction of the file.
    PositionChanged(f64),
    /// Length of the current file became known.
    LengthChanged(Duration),
}

impl NativeEvent {
    /// Map onto the normalized event, or `None` for notifications the
    /// player does not forward.
    pub const fn normalized(&self) -> Option<Event> {
        match self {
            Self::MediaChanged => Some(Event::FileChange),
            Self::Opening | Self::Playing | Self::Paused | Self::Stopped | Self::EndReached => {
                Some(Event::StateChange)
            }
            Self::AudioVolume(_) => Some(Event::VolumeChange),
            Self::EncounteredError(_) => Some(Event::Error),
            Self::Buffering(_) | Self::PositionChanged(_) | Self::LengthChanged(_) => None,
        }
    }
}

/// Callback invoked on the engine thread for every native event.
pub type NativeCallback = Box<dyn Fn(NativeEvent) + Send + Sync>;

/// A media-playback engine.
///
/// Commands return once issued; the engine confirms asynchronously through
/// the registered callback. Engines are shared, so duration parsing can run
/// without the player's lock.
pub trait Engine: Send + Sync {
    /// Load `location` and start playing it.
    fn open(&self, location: &Path) -> Result<()>;

    /// Pause (`true`) or resume (`false`) the current file.
    fn set_pause(&self, pause: bool) -> Result<()>;

    fn stop(&self) -> Result<()>;

    /// Jump to a fraction (0.0-1.0) of the current file.
    fn seek(&self, fraction: f64) -> Result<()>;

    /// Set the volume level (0-100).
    fn set_volume(&self, volume: u8) -> Result<()>;

    fn volume(&self) -> u8;

    /// Current native state code, see [`state_code`].
    fn state(&self) -> u8;

    /// Position in the current file as a fraction.
    fn position(&self) -> f64;

    /// Length of the file at `location`. May block while the container
    /// headers are read.
    fn parse_duration(&self, location: &Path) -> Option<Duration>;

    /// Register the callback for native events, replacing any previous one.
    fn on_event(&self, callback: NativeCallback);
}

impl<E: Engine> Engine for std::sync::Arc<E> {
    fn open(&self, location: &Path) -> Result<()> {
        (**self).open(location)
    }

    fn set_pause(&self, pause: bool) -> Result<()> {
        (**self).set_pause(pause)
    }

    fn stop(&self) -> Result<()> {
        (**self).stop()
    }

    fn seek(&self, fraction: f64) -> Result<()> {
        (**self).seek(fraction)
    }

    fn set_volume(&self, volume: u8) -> Result<()> {
        (**self).set_volume(volume)
    }

    fn volume(&self) -> u8 {
        (**self).volume()
    }

    fn state(&self) -> u8 {
        (**self).state()
    }

    fn position(&self) -> f64 {
        (**self).position()
    }

    fn parse_duration(&self, location: &Path) -> Option<Duration> {
        (**self).parse_duration(location)
    }

    fn on_event(&self, callback: NativeCallback) {
        (**self).on_event(callback);
    }
}
