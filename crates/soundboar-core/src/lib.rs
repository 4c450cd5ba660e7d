//! # soundboar-core
//!
//! Core types, traits, and error handling for the soundboar playlist
//! controller.

pub mod engine;
pub mod error;
pub mod media;
pub mod types;

pub use engine::{Engine, NativeCallback, NativeEvent};
pub use error::{Error, Result};
pub use types::*;
