//! # soundboar-app
//!
//! HTTP server for the soundboar playlist controller: the JSON API, the
//! event WebSocket, the static frontend and the data directory layout.

pub mod api;
pub mod config;
pub mod install;
pub mod logging;
pub mod services;

pub use api::{api_router, router, AppState};
