//! Engine stand-in and app fixtures for the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use soundboar_core::engine::state_code;
use soundboar_core::media::supported_suffixes;
use soundboar_core::{Engine, NativeCallback, NativeEvent, Result};

/// Engine that applies every command immediately and reports it on the
/// calling thread.
#[derive(Clone, Default)]
pub struct StubEngine {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: AtomicU8,
    volume: AtomicU8,
    position: Mutex<f64>,
    opened: Mutex<Vec<PathBuf>>,
    callback: RwLock<Option<NativeCallback>>,
}

impl StubEngine {
    pub fn set_state(&self, code: u8) {
        self.shared.state.store(code, Ordering::SeqCst);
    }

    pub fn fire(&self, event: NativeEvent) {
        if let Some(callback) = self.shared.callback.read().as_ref() {
            callback(event);
        }
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.shared.opened.lock().clone()
    }
}

impl Engine for StubEngine {
    fn open(&self, location: &Path) -> Result<()> {
        self.shared.opened.lock().push(location.to_path_buf());
        self.set_state(state_code::PLAYING);
        self.fire(NativeEvent::MediaChanged);
        self.fire(NativeEvent::Playing);
        Ok(())
    }

    fn set_pause(&self, pause: bool) -> Result<()> {
        self.set_state(if pause { state_code::PAUSED } else { state_code::PLAYING });
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.set_state(state_code::STOPPED);
        self.fire(NativeEvent::Stopped);
        Ok(())
    }

    fn seek(&self, fraction: f64) -> Result<()> {
        *self.shared.position.lock() = fraction;
        Ok(())
    }

    fn set_volume(&self, volume: u8) -> Result<()> {
        self.shared.volume.store(volume, Ordering::SeqCst);
        self.fire(NativeEvent::AudioVolume(volume));
        Ok(())
    }

    fn volume(&self) -> u8 {
        self.shared.volume.load(Ordering::SeqCst)
    }

    fn state(&self) -> u8 {
        self.shared.state.load(Ordering::SeqCst)
    }

    fn position(&self) -> f64 {
        *self.shared.position.lock()
    }

    fn parse_duration(&self, _location: &Path) -> Option<Duration> {
        Some(Duration::from_millis(1500))
    }

    fn on_event(&self, callback: NativeCallback) {
        *self.shared.callback.write() = Some(callback);
    }
}

/// A data directory with the installed layout and a few sounds.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub engine: StubEngine,
    pub state: soundboar_app::api::AppState,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        soundboar_app::install::install(dir.path(), soundboar_app::install::InstallOptions::default())
            .unwrap();
        for name in ["airhorn.mp3", "bell.wav", "crowd.ogg"] {
            std::fs::write(dir.path().join("sounds").join(name), name.as_bytes()).unwrap();
        }

        let engine = StubEngine::default();
        let player = soundboar_player::Player::new(engine.clone());
        let repository = soundboar_repository::Repository::new(
            dir.path().join("sounds"),
            supported_suffixes(),
        )
        .unwrap();

        let state = soundboar_app::api::AppState {
            player: Arc::new(Mutex::new(player)),
            repository: Arc::new(repository),
            extractor: soundboar_extractor::MetaExtractor::new().unwrap(),
        };

        Self { dir, engine, state }
    }

    pub fn router(&self) -> axum::Router {
        soundboar_app::api::router(self.state.clone(), &self.dir.path().join("static"), None)
    }
}
