//! Playback engine: a worker thread that decodes local files into the
//! output ring and reports progress through the native callback.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::{Mutex, RwLock};
use soundboar_core::engine::state_code;
use soundboar_core::{Engine, Error, NativeCallback, NativeEvent, Result};
use tracing::{debug, error, info, trace, warn};

use crate::buffer::{shared_ring_buffer, SharedRingBuffer};
use crate::decode::{self, AudioDecoder};
use crate::output::{NullOutput, OutputControl, Sink};
use crate::resample::Conformer;

/// About two seconds of 48 kHz stereo.
const RING_CAPACITY: usize = 48_000 * 2 * 2;

/// Samples queued before a freshly opened file starts playing.
const PREFILL: usize = 8192;

/// Minimum free room before the worker decodes another packet.
const DECODE_HEADROOM: usize = 4096;

const POSITION_INTERVAL: Duration = Duration::from_millis(250);

const IDLE_WAIT: Duration = Duration::from_millis(50);

/// Commands for the worker thread.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Open(PathBuf),
    SetPause(bool),
    Stop,
    Seek(f64),
    SetVolume(u8),
    Shutdown,
}

/// State shared between the handle and the worker.
struct Shared {
    state: Arc<AtomicU8>,
    volume: Arc<AtomicU8>,
    /// Fraction of the current file played.
    position: Mutex<f64>,
    callback: RwLock<Option<NativeCallback>>,
}

impl Shared {
    fn notify(&self, event: NativeEvent) {
        match self.callback.read().as_ref() {
            Some(callback) => callback(event),
            None => trace!("No listener for {event:?}"),
        }
    }

    fn set_state(&self, code: u8) {
        let old = self.state.swap(code, Ordering::AcqRel);
        if old != code {
            debug!("State {old} -> {code}");
        }
    }
}

/// Local-file playback engine.
pub struct AudioEngine {
    commands: Sender<Command>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AudioEngine {
    /// Start an engine on the default output device, falling back to a
    /// silent real-time sink when there is none.
    pub fn new() -> Result<Self> {
        Self::spawn(Sink::open)
    }

    /// Start an engine that never touches audio hardware.
    pub fn headless() -> Result<Self> {
        Self::spawn(|control| Sink::Null(NullOutput::new(control)))
    }

    fn spawn(open_sink: impl FnOnce(OutputControl) -> Sink + Send + 'static) -> Result<Self> {
        let (commands, command_rx) = unbounded();
        let shared = Arc::new(Shared {
            state: Arc::new(AtomicU8::new(state_code::IDLE)),
            volume: Arc::new(AtomicU8::new(100)),
            position: Mutex::new(0.0),
            callback: RwLock::new(None),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || {
                let ring = shared_ring_buffer(RING_CAPACITY);
                // cpal::Stream is not Send, so the sink is created here
                let sink = open_sink(OutputControl {
                    ring: Arc::clone(&ring),
                    state: Arc::clone(&worker_shared.state),
                    volume: Arc::clone(&worker_shared.volume),
                });
                Worker {
                    commands: command_rx,
                    shared: worker_shared,
                    ring,
                    sink,
                    track: None,
                }
                .run();
            })
            .map_err(|e| Error::Engine(format!("Failed to spawn engine thread: {e}")))?;

        Ok(Self {
            commands,
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::Engine("Audio engine is not running".to_string()))
    }
}

impl Engine for AudioEngine {
    fn open(&self, location: &Path) -> Result<()> {
        // Visible before the worker picks the command up, so an ENDED state
        // from the previous file cannot trigger a second advance.
        self.shared.set_state(state_code::OPENING);
        self.send(Command::Open(location.to_path_buf()))
    }

    fn set_pause(&self, pause: bool) -> Result<()> {
        self.send(Command::SetPause(pause))
    }

    fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    fn seek(&self, fraction: f64) -> Result<()> {
        self.send(Command::Seek(fraction))
    }

    fn set_volume(&self, volume: u8) -> Result<()> {
        self.shared.volume.store(volume.min(100), Ordering::Relaxed);
        self.send(Command::SetVolume(volume.min(100)))
    }

    fn volume(&self) -> u8 {
        self.shared.volume.load(Ordering::Relaxed)
    }

    fn state(&self) -> u8 {
        self.shared.state.load(Ordering::Acquire)
    }

    fn position(&self) -> f64 {
        *self.shared.position.lock()
    }

    fn parse_duration(&self, location: &Path) -> Option<Duration> {
        decode::read_duration(location)
    }

    fn on_event(&self, callback: NativeCallback) {
        *self.shared.callback.write() = Some(callback);
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("Audio engine worker panicked");
            }
        }
    }
}

/// The file being played.
struct Track {
    decoder: AudioDecoder,
    conformer: Conformer,
    /// Converted samples that did not fit in the ring yet.
    carry: Vec<f32>,
    exhausted: bool,
    /// Seconds into the file where the ring's `played` counter started.
    offset: f64,
}

struct Worker {
    commands: Receiver<Command>,
    shared: Arc<Shared>,
    ring: SharedRingBuffer,
    sink: Sink,
    track: Option<Track>,
}

impl Worker {
    fn run(mut self) {
        info!("Audio engine worker started");
        let mut last_position = Instant::now();

        loop {
            let playing = self.state() == state_code::PLAYING;
            let command = if playing {
                match self.commands.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match self.commands.recv_timeout(IDLE_WAIT) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            };

            match command {
                Some(Command::Shutdown) => break,
                Some(command) => self.handle(command),
                None => {}
            }

            self.sink.pump();

            if self.state() == state_code::PLAYING {
                let progressed = self.fill();
                self.check_end();

                if last_position.elapsed() >= POSITION_INTERVAL {
                    self.publish_position();
                    last_position = Instant::now();
                }

                if !progressed {
                    std::thread::sleep(Duration::from_millis(2));
                }
            }
        }

        info!("Audio engine worker stopped");
    }

    fn state(&self) -> u8 {
        self.shared.state.load(Ordering::Acquire)
    }

    fn handle(&mut self, command: Command) {
        trace!("Handling {command:?}");
        match command {
            Command::Open(location) => self.open(&location),
            Command::SetPause(pause) => self.set_pause(pause),
            Command::Stop => {
                self.reset();
                self.shared.set_state(state_code::STOPPED);
                self.shared.notify(NativeEvent::Stopped);
            }
            Command::Seek(fraction) => self.seek(fraction),
            Command::SetVolume(volume) => self.shared.notify(NativeEvent::AudioVolume(volume)),
            Command::Shutdown => {}
        }
    }

    fn reset(&mut self) {
        self.track = None;
        self.ring.clear();
        self.ring.reset_played();
        *self.shared.position.lock() = 0.0;
    }

    fn open(&mut self, location: &Path) {
        self.reset();
        self.shared.set_state(state_code::OPENING);
        self.shared.notify(NativeEvent::MediaChanged);
        self.shared.notify(NativeEvent::Opening);

        let track = AudioDecoder::open(location).and_then(|decoder| {
            let conformer = Conformer::new(
                decoder.sample_rate(),
                decoder.channels(),
                self.sink.sample_rate(),
                self.sink.channels(),
            )?;
            Ok(Track {
                decoder,
                conformer,
                carry: Vec::new(),
                exhausted: false,
                offset: 0.0,
            })
        });

        let track = match track {
            Ok(track) => track,
            Err(e) => {
                self.fail(format!("Cannot play {}: {e}", location.display()));
                return;
            }
        };

        if let Some(length) = track.decoder.duration() {
            self.shared.notify(NativeEvent::LengthChanged(length));
        }
        self.track = Some(track);

        self.shared.set_state(state_code::BUFFERING);
        self.shared.notify(NativeEvent::Buffering(0.0));
        while self.ring.available() < PREFILL && self.fill() {}
        self.shared.notify(NativeEvent::Buffering(100.0));

        if self.state() == state_code::BUFFERING {
            info!("Playing {}", location.display());
            self.shared.set_state(state_code::PLAYING);
            self.shared.notify(NativeEvent::Playing);
        }
    }

    fn set_pause(&mut self, pause: bool) {
        if self.track.is_none() {
            debug!("Nothing loaded, ignoring pause={pause}");
            return;
        }

        match (pause, self.state()) {
            (true, state_code::PLAYING | state_code::BUFFERING) => {
                self.shared.set_state(state_code::PAUSED);
                self.shared.notify(NativeEvent::Paused);
            }
            (false, state_code::PAUSED) => {
                self.shared.set_state(state_code::PLAYING);
                self.shared.notify(NativeEvent::Playing);
            }
            (_, state) => trace!("pause={pause} has no effect in state {state}"),
        }
    }

    fn seek(&mut self, fraction: f64) {
        let Some(track) = &mut self.track else {
            debug!("Nothing loaded, ignoring seek");
            return;
        };

        let seconds = match track.decoder.duration() {
            Some(length) => length.as_secs_f64() * fraction,
            None if fraction == 0.0 => 0.0,
            None => {
                warn!("Cannot seek in a file of unknown length");
                return;
            }
        };

        if let Err(e) = track.decoder.seek(seconds) {
            self.fail(e.to_string());
            return;
        }
        track.conformer.reset();
        track.carry.clear();
        track.exhausted = false;
        track.offset = seconds;
        self.ring.clear();
        self.ring.reset_played();
        *self.shared.position.lock() = fraction;
        self.shared.notify(NativeEvent::PositionChanged(fraction));

        if self.state() == state_code::ENDED {
            self.shared.set_state(state_code::PLAYING);
            self.shared.notify(NativeEvent::Playing);
        }
    }

    /// Move decoded audio into the ring. Returns whether anything moved.
    fn fill(&mut self) -> bool {
        let Some(track) = &mut self.track else {
            return false;
        };

        if !track.carry.is_empty() {
            let pushed = self.ring.push(&track.carry);
            track.carry.drain(..pushed);
            return pushed > 0;
        }

        if track.exhausted || self.ring.free() < DECODE_HEADROOM {
            return false;
        }

        let converted = match track.decoder.decode_next() {
            Ok(Some(samples)) => track.conformer.process(samples),
            Ok(None) => {
                track.exhausted = true;
                track.conformer.flush()
            }
            Err(e) => Err(e),
        };

        match converted {
            Ok(samples) => {
                let pushed = self.ring.push(&samples);
                track.carry.extend_from_slice(&samples[pushed..]);
                true
            }
            Err(e) => {
                let message = e.to_string();
                self.fail(message);
                false
            }
        }
    }

    fn check_end(&mut self) {
        let finished = self
            .track
            .as_ref()
            .is_some_and(|t| t.exhausted && t.carry.is_empty())
            && self.ring.is_empty();
        if finished {
            debug!("End of file reached");
            *self.shared.position.lock() = 1.0;
            self.shared.set_state(state_code::ENDED);
            self.shared.notify(NativeEvent::EndReached);
        }
    }

    fn publish_position(&self) {
        let Some(track) = &self.track else {
            return;
        };
        let Some(length) = track.decoder.duration().filter(|l| !l.is_zero()) else {
            return;
        };

        let per_second = f64::from(self.sink.sample_rate()) * self.sink.channels() as f64;
        let played = track.offset + self.ring.played() as f64 / per_second;
        let fraction = (played / length.as_secs_f64()).clamp(0.0, 1.0);

        *self.shared.position.lock() = fraction;
        self.shared.notify(NativeEvent::PositionChanged(fraction));
    }

    fn fail(&mut self, message: String) {
        error!("{message}");
        self.track = None;
        self.ring.clear();
        self.shared.set_state(state_code::ERROR);
        self.shared.notify(NativeEvent::EncounteredError(message));
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::testing::write_wav;
    use crossbeam_channel::Receiver;

    const WAIT: Duration = Duration::from_secs(5);

    fn engine() -> (AudioEngine, Receiver<NativeEvent>) {
        let engine = AudioEngine::headless().unwrap();
        let (tx, rx) = unbounded();
        engine.on_event(Box::new(move |event: NativeEvent| {
            let _ = tx.send(event);
        }));
        (engine, rx)
    }

    fn wait_for(rx: &Receiver<NativeEvent>, wanted: impl Fn(&NativeEvent) -> bool) -> Vec<NativeEvent> {
        let deadline = Instant::now() + WAIT;
        let mut seen = Vec::new();
        while let Ok(event) = rx.recv_deadline(deadline) {
            let done = wanted(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
        panic!("event not seen, got {seen:?}");
    }

    #[test]
    fn test_plays_file_to_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_wav(&path, 8_000, 1_600);

        let (engine, rx) = engine();
        assert_eq!(engine.state(), state_code::IDLE);
        engine.open(&path).unwrap();
        assert_eq!(engine.state(), state_code::OPENING);

        let seen = wait_for(&rx, |e| *e == NativeEvent::Playing);
        assert_eq!(seen[0], NativeEvent::MediaChanged);
        assert_eq!(seen[1], NativeEvent::Opening);
        assert!(seen.iter().any(|e| matches!(
            e,
            NativeEvent::LengthChanged(length) if (length.as_secs_f64() - 0.2).abs() < 1e-3
        )));

        wait_for(&rx, |e| *e == NativeEvent::EndReached);
        assert_eq!(engine.state(), state_code::ENDED);
        assert!((engine.position() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pause_and_resume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        write_wav(&path, 8_000, 80_000);

        let (engine, rx) = engine();
        engine.open(&path).unwrap();
        wait_for(&rx, |e| *e == NativeEvent::Playing);

        engine.set_pause(true).unwrap();
        wait_for(&rx, |e| *e == NativeEvent::Paused);
        assert_eq!(engine.state(), state_code::PAUSED);

        engine.set_pause(false).unwrap();
        wait_for(&rx, |e| *e == NativeEvent::Playing);

        engine.seek(0.5).unwrap();
        wait_for(&rx, |e| *e == NativeEvent::PositionChanged(0.5));

        engine.stop().unwrap();
        wait_for(&rx, |e| *e == NativeEvent::Stopped);
        assert_eq!(engine.state(), state_code::STOPPED);
    }

    #[test]
    fn test_unreadable_file_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"not audio at all").unwrap();

        let (engine, rx) = engine();
        engine.open(&path).unwrap();

        let seen = wait_for(&rx, |e| matches!(e, NativeEvent::EncounteredError(_)));
        assert_eq!(seen[0], NativeEvent::MediaChanged);
        assert_eq!(engine.state(), state_code::ERROR);
    }

    #[test]
    fn test_volume_is_immediate_and_announced() {
        let (engine, rx) = engine();
        engine.set_volume(30).unwrap();
        assert_eq!(engine.volume(), 30);
        wait_for(&rx, |e| *e == NativeEvent::AudioVolume(30));
    }

    #[test]
    fn test_parse_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.wav");
        write_wav(&path, 8_000, 16_000);

        let engine = AudioEngine::headless().unwrap();
        assert_eq!(engine.parse_duration(&path), Some(Duration::from_secs(2)));
        assert_eq!(engine.parse_duration(&dir.path().join("gone.wav")), None);
    }
}
