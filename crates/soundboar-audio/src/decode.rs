//! File decoding using symphonia.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use soundboar_core::{Error, Result};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader, SeekMode, SeekTo},
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
    units::Time,
};
use tracing::{debug, trace, warn};

/// Decoder for one local audio file, producing interleaved `f32` samples.
pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    duration: Option<Duration>,
    samples: Option<SampleBuffer<f32>>,
}

impl AudioDecoder {
    pub fn open(location: &Path) -> Result<Self> {
        let format = open_format(location)?;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::AudioDecode(format!("No audio track in {}", location.display())))?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(48_000);
        let channels = track.codec_params.channels.map_or(2, |c| c.count()).max(1);
        let duration = track_duration(&track.codec_params);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::AudioDecode(format!("Unsupported codec: {e}")))?;

        debug!(
            "Opened {}: {sample_rate} Hz, {channels} channels, {duration:?}",
            location.display()
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            duration,
            samples: None,
        })
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn channels(&self) -> usize {
        self.channels
    }

    pub const fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Decode the next packet. `Ok(None)` at the end of the file.
    pub fn decode_next(&mut self) -> Result<Option<&[f32]>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => return Err(Error::AudioDecode(format!("Failed to read packet: {e}"))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    trace!("Skipping corrupt packet: {e}");
                    continue;
                }
                Err(e) => return Err(Error::AudioDecode(format!("Decode failed: {e}"))),
            };

            let spec = *decoded.spec();
            let needed = decoded.capacity() as u64;
            let fits = self
                .samples
                .as_ref()
                .is_some_and(|b| b.capacity() as u64 >= needed * spec.channels.count() as u64);
            if !fits {
                self.samples = None;
            }
            let buffer = self
                .samples
                .get_or_insert_with(|| SampleBuffer::new(needed, spec));
            buffer.copy_interleaved_ref(decoded);
            return Ok(Some(buffer.samples()));
        }
    }

    /// Seek to `seconds` from the start.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        self.format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::from(seconds.max(0.0)),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| Error::AudioDecode(format!("Seek failed: {e}")))?;
        self.decoder.reset();
        Ok(())
    }
}

/// Length of the file at `location` without decoding it.
pub fn read_duration(location: &Path) -> Option<Duration> {
    let format = match open_format(location) {
        Ok(format) => format,
        Err(e) => {
            warn!("{e}");
            return None;
        }
    };

    format
        .tracks()
        .iter()
        .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .find_map(|t| track_duration(&t.codec_params))
}

fn open_format(location: &Path) -> Result<Box<dyn FormatReader>> {
    let file = File::open(location)?;
    let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(extension) = location.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let format_opts = FormatOptions {
        enable_gapless: true,
        ..Default::default()
    };

    symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &MetadataOptions::default())
        .map(|found| found.format)
        .map_err(|e| Error::AudioDecode(format!("Failed to read {}: {e}", location.display())))
}

fn track_duration(params: &CodecParameters) -> Option<Duration> {
    let frames = params.n_frames?;
    if let Some(time_base) = params.time_base {
        let time = time_base.calc_time(frames);
        return Some(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac));
    }
    let rate = params.sample_rate?;
    Some(Duration::from_secs_f64(frames as f64 / f64::from(rate)))
}
