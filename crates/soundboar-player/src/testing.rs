//! Scripted engine for exercising the player without audio hardware.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use soundboar_core::engine::state_code;
use soundboar_core::{Engine, Error, NativeCallback, NativeEvent, Result};

/// Command the player issued.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Open(PathBuf),
    SetPause(bool),
    Stop,
    Seek(f64),
    SetVolume(u8),
}

#[derive(Default)]
struct Shared {
    commands: Mutex<Vec<Command>>,
    state: AtomicU8,
    volume: AtomicU8,
    position: Mutex<f64>,
    durations: Mutex<HashMap<PathBuf, Duration>>,
    parses: AtomicUsize,
    callback: RwLock<Option<NativeCallback>>,
    failing: Mutex<bool>,
    confirmations: Mutex<Vec<JoinHandle<()>>>,
}

/// Engine that confirms commands from a separate thread, like a native
/// engine would.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    shared: Arc<Shared>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        let engine = Self::default();
        engine.shared.volume.store(100, Ordering::SeqCst);
        engine
    }

    pub fn commands(&self) -> Vec<Command> {
        self.shared.commands.lock().clone()
    }

    pub fn set_duration(&self, location: impl Into<PathBuf>, duration: Duration) {
        self.shared.durations.lock().insert(location.into(), duration);
    }

    pub fn parse_count(&self) -> usize {
        self.shared.parses.load(Ordering::SeqCst)
    }

    /// Make every following command fail synchronously.
    pub fn fail_commands(&self) {
        *self.shared.failing.lock() = true;
    }

    pub fn set_state(&self, code: u8) {
        self.shared.state.store(code, Ordering::SeqCst);
    }

    /// Fire native events from a fresh thread and wait for it to finish.
    pub fn fire(&self, events: Vec<NativeEvent>) {
        let shared = Arc::clone(&self.shared);
        std::thread::spawn(move || {
            let callback = shared.callback.read();
            if let Some(callback) = callback.as_ref() {
                for event in events {
                    callback(event);
                }
            }
        })
        .join()
        .unwrap();
    }

    /// Wait until every pending open has been confirmed.
    pub fn settle(&self) {
        let pending = std::mem::take(&mut *self.shared.confirmations.lock());
        for handle in pending {
            handle.join().unwrap();
        }
    }

    fn record(&self, command: Command) -> Result<()> {
        if *self.shared.failing.lock() {
            return Err(Error::Engine("engine is gone".to_string()));
        }
        self.shared.commands.lock().push(command);
        Ok(())
    }
}

impl Engine for ScriptedEngine {
    fn open(&self, location: &Path) -> Result<()> {
        self.record(Command::Open(location.to_path_buf()))?;
        self.set_state(state_code::OPENING);
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::spawn(move || {
            let callback = shared.callback.read();
            if let Some(callback) = callback.as_ref() {
                callback(NativeEvent::MediaChanged);
                callback(NativeEvent::Opening);
                callback(NativeEvent::Buffering(100.0));
                shared.state.store(state_code::PLAYING, Ordering::SeqCst);
                callback(NativeEvent::Playing);
            }
        });
        self.shared.confirmations.lock().push(handle);
        Ok(())
    }

    fn set_pause(&self, pause: bool) -> Result<()> {
        self.record(Command::SetPause(pause))?;
        let code = if pause { state_code::PAUSED } else { state_code::PLAYING };
        self.set_state(code);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.record(Command::Stop)?;
        self.set_state(state_code::STOPPED);
        Ok(())
    }

    fn seek(&self, fraction: f64) -> Result<()> {
        self.record(Command::Seek(fraction))?;
        *self.shared.position.lock() = fraction;
        Ok(())
    }

    fn set_volume(&self, volume: u8) -> Result<()> {
        self.record(Command::SetVolume(volume))?;
        self.shared.volume.store(volume, Ordering::SeqCst);
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

    fn parse_duration(&self, location: &Path) -> Option<Duration> {
        self.shared.parses.fetch_add(1, Ordering::SeqCst);
        self.shared.durations.lock().get(location).copied()
    }

    fn on_event(&self, callback: NativeCallback) {
        *self.shared.callback.write() = Some(callback);
    }
}
