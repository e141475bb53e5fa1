//! In-memory audio decoding
//!
//! Uses symphonia for format-agnostic decoding (MP3, FLAC, WAV, OGG) straight
//! from the byte buffer handed in by the hosting layer, then downmixes to mono
//! and resamples to the working rate.

use super::resampler::Resampler;
use super::Waveform;
use crate::error::{DetectError, Result};
use crate::types::AudioFormat;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Working sample rate for feature extraction
pub const DEFAULT_TARGET_SAMPLE_RATE: u32 = 22050;

/// Shortest recording accepted for classification
pub const DEFAULT_MIN_DURATION_SECS: f64 = 0.5;

/// Decodes raw container bytes into a mono [`Waveform`]
#[derive(Debug, Clone)]
pub struct AudioDecoder {
    target_sample_rate: u32,
    min_duration_secs: f64,
}

impl Default for AudioDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_SAMPLE_RATE, DEFAULT_MIN_DURATION_SECS)
    }
}

impl AudioDecoder {
    pub fn new(target_sample_rate: u32, min_duration_secs: f64) -> Self {
        Self {
            target_sample_rate,
            min_duration_secs,
        }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    pub fn min_duration_secs(&self) -> f64 {
        self.min_duration_secs
    }

    /// Decode `bytes` declared as `format` into a mono waveform
    ///
    /// **Algorithm:**
    /// 1. Verify the container signature matches the declared format
    /// 2. Probe and open the default audio track
    /// 3. Decode every packet, averaging channels to mono
    /// 4. Resample to the target rate
    /// 5. Enforce the minimum duration
    ///
    /// # Errors
    /// `DetectError::Decode` for empty, unparseable, mismatched or too-short input.
    pub fn decode(&self, bytes: &[u8], format: AudioFormat) -> Result<Waveform> {
        if bytes.is_empty() {
            return Err(DetectError::Decode("Audio data is empty".to_string()));
        }
        if !format.matches_signature(bytes) {
            return Err(DetectError::Decode(format!(
                "Declared format '{}' does not match audio content",
                format
            )));
        }

        let (mono, source_rate, channels) = decode_to_mono(bytes, format)?;

        debug!(
            format = %format,
            source_rate = source_rate,
            channels = channels,
            frames = mono.len(),
            "Audio decoding complete"
        );

        let samples = Resampler::resample_mono(&mono, source_rate, self.target_sample_rate)?;
        let waveform = Waveform::new(samples, self.target_sample_rate)?;

        if waveform.duration_seconds() < self.min_duration_secs {
            return Err(DetectError::Decode(format!(
                "Audio too short: {:.3}s (minimum {:.3}s)",
                waveform.duration_seconds(),
                self.min_duration_secs
            )));
        }

        Ok(waveform)
    }
}

/// Decode all packets of the default track and downmix to mono
///
/// Returns (mono samples, native sample rate, channel count).
fn decode_to_mono(bytes: &[u8], format: AudioFormat) -> Result<(Vec<f32>, u32, usize)> {
    let source = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DetectError::Decode(format!("Failed to probe audio: {}", e)))?;

    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DetectError::Decode("No audio track found".to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DetectError::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut mono: Vec<f32> = Vec::new();
    let mut channels = 0usize;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(DetectError::Decode(format!("Error reading packet: {}", e)));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt frame inside an otherwise valid stream
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(DetectError::Decode(format!("Failed to decode packet: {}", e))),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        sample_rate.get_or_insert(spec.rate);

        let needed = decoded.capacity() * channels;
        if sample_buf.as_ref().map_or(true, |b| b.capacity() < needed) {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        mono.extend(downmix(buf.samples(), channels));
    }

    let sample_rate =
        sample_rate.ok_or_else(|| DetectError::Decode("Sample rate unknown".to_string()))?;

    if mono.is_empty() {
        return Err(DetectError::Decode("No audio samples decoded".to_string()));
    }

    Ok((mono, sample_rate, channels))
}

/// Average interleaved channels into mono
fn downmix(interleaved: &[f32], channels: usize) -> impl Iterator<Item = f32> + '_ {
    let channels = channels.max(1);
    interleaved
        .chunks_exact(channels)
        .map(move |frame| frame.iter().sum::<f32>() / channels as f32)
}
