//! Conversion of decoded samples to the output device's rate and layout.

use rubato::{FftFixedIn, Resampler};
use soundboar_core::{Error, Result};
use tracing::debug;

const CHUNK_FRAMES: usize = 1024;

/// Remixes channels and, when the rates differ, resamples with rubato.
pub struct Conformer {
    channels_in: usize,
    channels_out: usize,
    rate_in: u32,
    rate_out: u32,
    resampler: Option<FftFixedIn<f32>>,
    /// Remixed frames waiting for a full resampler chunk, one `Vec` per
    /// output channel.
    pending: Vec<Vec<f32>>,
}

impl Conformer {
    pub fn new(rate_in: u32, channels_in: usize, rate_out: u32, channels_out: usize) -> Result<Self> {
        let channels_in = channels_in.max(1);
        let channels_out = channels_out.max(1);

        let resampler = if rate_in == rate_out {
            None
        } else {
            let resampler = FftFixedIn::new(
                rate_in as usize,
                rate_out as usize,
                CHUNK_FRAMES,
                2,
                channels_out,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to create resampler: {e}")))?;
            debug!("Resampling {rate_in} Hz -> {rate_out} Hz");
            Some(resampler)
        };

        Ok(Self {
            channels_in,
            channels_out,
            rate_in,
            rate_out,
            resampler,
            pending: vec![Vec::new(); channels_out],
        })
    }

    pub const fn is_passthrough(&self) -> bool {
        self.resampler.is_none() && self.channels_in == self.channels_out
    }

    /// Convert interleaved input; may hold back frames until a full chunk
    /// is available.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if self.is_passthrough() {
            return Ok(input.to_vec());
        }

        self.remix_into_pending(input);
        if self.resampler.is_none() {
            return Ok(self.drain_pending());
        }

        let mut output = Vec::new();
        while self.pending[0].len() >= CHUNK_FRAMES {
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|ch| ch.drain(..CHUNK_FRAMES).collect())
                .collect();
            self.resample_chunk(&chunk, usize::MAX, &mut output)?;
        }
        Ok(output)
    }

    /// Push out whatever is held back, padding the last chunk with silence.
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        let mut output = Vec::new();
        if self.resampler.is_none() {
            return Ok(self.drain_pending());
        }

        let remaining = self.pending[0].len();
        if remaining == 0 {
            return Ok(output);
        }

        let chunk: Vec<Vec<f32>> = self
            .pending
            .iter_mut()
            .map(|ch| {
                let mut data = std::mem::take(ch);
                data.resize(CHUNK_FRAMES, 0.0);
                data
            })
            .collect();
        let keep = (remaining as f64 * f64::from(self.rate_out) / f64::from(self.rate_in)).ceil() as usize;
        self.resample_chunk(&chunk, keep, &mut output)?;
        Ok(output)
    }

    /// Forget held-back frames, e.g. after a seek.
    pub fn reset(&mut self) {
        if let Some(resampler) = &mut self.resampler {
            resampler.reset();
        }
        self.pending.iter_mut().for_each(Vec::clear);
    }

    fn remix_into_pending(&mut self, input: &[f32]) {
        for frame in input.chunks_exact(self.channels_in) {
            if self.channels_out == 1 {
                let mean = frame.iter().sum::<f32>() / self.channels_in as f32;
                self.pending[0].push(mean);
            } else {
                for (ch, pending) in self.pending.iter_mut().enumerate() {
                    pending.push(frame[ch % self.channels_in]);
                }
            }
        }
    }

    fn drain_pending(&mut self) -> Vec<f32> {
        let frames = self.pending[0].len();
        let mut output = Vec::with_capacity(frames * self.channels_out);
        for frame in 0..frames {
            output.extend(self.pending.iter().map(|ch| ch[frame]));
        }
        self.pending.iter_mut().for_each(Vec::clear);
        output
    }

    fn resample_chunk(&mut self, chunk: &[Vec<f32>], keep: usize, output: &mut Vec<f32>) -> Result<()> {
        let Some(resampler) = &mut self.resampler else {
            return Ok(());
        };
        let resampled = resampler
            .process(chunk, None)
            .map_err(|e| Error::AudioOutput(format!("Resample failed: {e}")))?;

        let frames = resampled.first().map_or(0, Vec::len).min(keep);
        output.reserve(frames * self.channels_out);
        for frame in 0..frames {
            output.extend(resampled.iter().map(|ch| ch[frame]));
        }
        Ok(())
    }
}
