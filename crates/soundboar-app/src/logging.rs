//! Tracing subscriber setup.

use clap::ValueEnum;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str =
    "soundboar=info,soundboar_app=info,soundboar_player=info,soundboar_audio=info,tower_http=info";

/// Log level names accepted by `--log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
    /// Defer to `RUST_LOG`, or the built-in default.
    Notset,
}

impl LogLevel {
    /// The matching tracing directive, if this level sets one.
    pub const fn directive(self) -> Option<&'static str> {
        match self {
            Self::Critical | Self::Error => Some("error"),
            Self::Warning => Some("warn"),
            Self::Info => Some("info"),
            Self::Debug => Some("debug"),
            Self::Notset => None,
        }
    }
}

/// Filter for `level`, falling back to `RUST_LOG` and then the default.
pub fn filter(level: LogLevel) -> EnvFilter {
    match level.directive() {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
    }
}

/// Install the global subscriber.
pub fn init(level: LogLevel) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter(level))
        .init();
}
