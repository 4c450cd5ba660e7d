//! Background tasks running next to the HTTP server.

pub mod autoplay;
