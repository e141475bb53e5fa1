//! Mono resampling using rubato
//!
//! Every decoded waveform is brought to the extractor's working rate before
//! feature extraction, so features are comparable across source rates.

use crate::error::{DetectError, Result};
use rubato::{
    Resampler as RubatoResampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Mono sinc resampler
pub struct Resampler;

impl Resampler {
    /// Resample mono samples from `input_rate` to `output_rate`
    ///
    /// Returns a copy when the rates already match. Uses a 256-tap sinc
    /// filter with a BlackmanHarris2 window, processed as a single chunk.
    pub fn resample_mono(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
        if input_rate == output_rate {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            return Ok(input.to_vec());
        }
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let mut resampler = SincFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            params,
            input.len(),
            1,
        )
        .map_err(|e| DetectError::Decode(format!("Failed to create resampler: {}", e)))?;

        let planar_input = vec![input.to_vec()];
        let mut planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| DetectError::Decode(format!("Resampling failed: {}", e)))?;

        let output = planar_output.pop().unwrap_or_default();

        debug!(
            "Resampled {} frames ({} Hz) -> {} frames ({} Hz)",
            input.len(),
            input_rate,
            output.len(),
            output_rate
        );

        Ok(output)
    }
}
