//! Audio input: container decoding, mono downmix and resampling
//!
//! Everything downstream sees a [`Waveform`]: mono f32 samples at one fixed
//! sample rate.

pub mod decoder;
pub mod resampler;

pub use decoder::{AudioDecoder, DEFAULT_MIN_DURATION_SECS, DEFAULT_TARGET_SAMPLE_RATE};

use crate::error::{DetectError, Result};

/// Mono PCM waveform at a fixed sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Wrap mono samples
    ///
    /// Fails on an empty buffer, a zero sample rate, or non-finite samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(DetectError::Decode("Empty sample buffer".to_string()));
        }
        if sample_rate == 0 {
            return Err(DetectError::Decode("Sample rate must be positive".to_string()));
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(DetectError::Decode(
                "Waveform contains non-finite samples".to_string(),
            ));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Mono samples (f32, nominally in [-1.0, 1.0])
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_rejects_empty() {
        assert!(matches!(
            Waveform::new(Vec::new(), 22050),
            Err(DetectError::Decode(_))
        ));
    }

    #[test]
    fn test_waveform_rejects_nan() {
        assert!(Waveform::new(vec![0.0, f32::NAN], 22050).is_err());
    }

    #[test]
    fn test_waveform_duration() {
        let wave = Waveform::new(vec![0.0; 11025], 22050).unwrap();
        assert!((wave.duration_seconds() - 0.5).abs() < 1e-9);
        assert_eq!(wave.len(), 11025);
    }
}
