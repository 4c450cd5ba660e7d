//! Audio output using cpal.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, SampleFormat, Stream, StreamConfig,
};
use soundboar_core::engine::state_code;
use soundboar_core::{Error, Result};
use tracing::{debug, error, info, trace, warn};

use crate::buffer::SharedRingBuffer;

/// Controls the output callback reads on every period.
#[derive(Clone)]
pub struct OutputControl {
    pub ring: SharedRingBuffer,
    /// Native state code; samples are only drawn while playing.
    pub state: Arc<AtomicU8>,
    /// Volume percentage, 0-100.
    pub volume: Arc<AtomicU8>,
}

/// An open output stream on the default device.
///
/// `cpal::Stream` is not `Send`, so this lives on the engine worker thread.
pub struct AudioOutput {
    _stream: Stream,
    sample_rate: u32,
    channels: usize,
    device_name: String,
}

impl AudioOutput {
    pub fn open(control: OutputControl) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No output device found".to_string()))?;
        Self::with_device(&device, control)
    }

    pub fn with_device(device: &Device, control: OutputControl) -> Result<Self> {
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get output config: {e}")))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        debug!("Output config for {device_name}: {config:?} {sample_format:?}");

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(device, &config, control)?,
            SampleFormat::I16 => build_stream::<i16>(device, &config, control)?,
            SampleFormat::U16 => build_stream::<u16>(device, &config, control)?,
            other => {
                return Err(Error::AudioOutput(format!("Unsupported sample format: {other:?}")));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {e}")))?;

        info!(
            "Audio output on {device_name}: {} Hz, {} channels",
            config.sample_rate.0, config.channels
        );

        Ok(Self {
            _stream: stream,
            sample_rate: config.sample_rate.0,
            channels: usize::from(config.channels),
            device_name,
        })
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn channels(&self) -> usize {
        self.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

fn build_stream<T>(device: &Device, config: &StreamConfig, control: OutputControl) -> Result<Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if control.state.load(Ordering::Acquire) != state_code::PLAYING {
                    data.fill(T::EQUILIBRIUM);
                    return;
                }

                scratch.clear();
                scratch.resize(data.len(), 0.0);
                let read = control.ring.pop(&mut scratch);
                if read < data.len() && read > 0 {
                    trace!("Underrun: wanted {}, had {read}", data.len());
                }

                let gain = f32::from(control.volume.load(Ordering::Relaxed)) / 100.0;
                for (out, sample) in data.iter_mut().zip(&scratch) {
                    *out = T::from_sample((sample * gain).clamp(-1.0, 1.0));
                }
            },
            |err| error!("Audio stream error: {err}"),
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {e}")))
}

/// Stand-in for a device: drains the ring in real time at a fixed format,
/// so playback advances and ends without audio hardware.
pub struct NullOutput {
    control: OutputControl,
    last: Instant,
    scratch: Vec<f32>,
}

impl NullOutput {
    pub const SAMPLE_RATE: u32 = 48_000;
    pub const CHANNELS: usize = 2;

    pub fn new(control: OutputControl) -> Self {
        Self {
            control,
            last: Instant::now(),
            scratch: Vec::new(),
        }
    }

    /// Consume what a device would have played since the last call.
    pub fn pump(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;

        if self.control.state.load(Ordering::Acquire) != state_code::PLAYING {
            return;
        }

        let samples = (elapsed.as_secs_f64() * f64::from(Self::SAMPLE_RATE)) as usize * Self::CHANNELS;
        self.scratch.resize(samples, 0.0);
        self.control.ring.pop(&mut self.scratch);
    }
}

/// Where the worker's samples go.
pub enum Sink {
    Device(AudioOutput),
    Null(NullOutput),
}

impl Sink {
    /// The default device, or a [`NullOutput`] when none can be opened.
    pub fn open(control: OutputControl) -> Self {
        match AudioOutput::open(control.clone()) {
            Ok(output) => Self::Device(output),
            Err(e) => {
                warn!("{e}; playing without an audio device");
                Self::Null(NullOutput::new(control))
            }
        }
    }

    pub const fn sample_rate(&self) -> u32 {
        match self {
            Self::Device(output) => output.sample_rate(),
            Self::Null(_) => NullOutput::SAMPLE_RATE,
        }
    }

    pub const fn channels(&self) -> usize {
        match self {
            Self::Device(output) => output.channels(),
            Self::Null(_) => NullOutput::CHANNELS,
        }
    }

    pub fn pump(&mut self) {
        if let Self::Null(null) = self {
            null.pump();
        }
    }
}
