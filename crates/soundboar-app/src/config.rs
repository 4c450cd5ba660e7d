//! Runtime configuration resolved from the command line and environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_PORT: u16 = 8000;

/// CORS origin allowed in development mode unless one is configured.
pub const DEVELOPMENT_ORIGIN: &str = "http://localhost:5173";

/// Where the data directory lives when none is given.
pub fn default_directory() -> Option<PathBuf> {
    ProjectDirs::from("", "", "soundboar").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Settings for a server run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Data directory holding `sounds/` and `static/`.
    pub directory: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            cors_origin: None,
        }
    }

    pub fn sounds_dir(&self) -> PathBuf {
        sounds_dir(&self.directory)
    }

    pub fn static_dir(&self) -> PathBuf {
        static_dir(&self.directory)
    }

    pub const fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

pub fn sounds_dir(directory: &Path) -> PathBuf {
    directory.join("sounds")
}

pub fn static_dir(directory: &Path) -> PathBuf {
    directory.join("static")
}
