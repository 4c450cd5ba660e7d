//! # soundboar-audio
//!
//! Local-file playback engine for soundboar.
//!
//! - symphonia decoding of the supported audio formats
//! - channel remixing and rubato resampling to the device format
//! - a lock-free sample ring feeding a cpal output stream

pub mod buffer;
pub mod decode;
pub mod engine;
pub mod output;
pub mod resample;

#[cfg(test)]
mod testing;

pub use engine::AudioEngine;
