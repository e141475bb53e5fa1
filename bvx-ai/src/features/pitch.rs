//! Pitch tracking by parabolic peak interpolation
//!
//! A bin is a pitch candidate when it lies in `[fmin, fmax)`, is a local
//! maximum along frequency, and exceeds `threshold` times the frame's peak
//! magnitude. Each candidate's frequency and magnitude are refined by
//! quadratic interpolation. Per frame, the candidate with the largest
//! refined magnitude is the frame's pitch; non-candidates carry pitch 0.

use super::stats;

/// Pitch summary over voiced frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchStats {
    pub mean: f64,
    pub std: f64,
    pub variance: f64,
    /// Number of frames with a positive pitch candidate
    pub voiced_frames: usize,
}

/// Pitch tracker settings
#[derive(Debug, Clone, Copy)]
pub struct PitchTracker {
    pub fmin: f64,
    pub fmax: f64,
    pub threshold: f64,
}

impl PitchTracker {
    /// Per-frame pitch estimate in Hz (0 when the frame has no candidate)
    pub fn track(&self, magnitude: &[Vec<f64>], sample_rate: u32, n_fft: usize) -> Vec<f64> {
        magnitude
            .iter()
            .map(|frame| self.frame_pitch(frame, sample_rate, n_fft))
            .collect()
    }

    fn frame_pitch(&self, frame: &[f64], sample_rate: u32, n_fft: usize) -> f64 {
        let n = frame.len();
        if n < 3 {
            return 0.0;
        }

        let peak = frame.iter().copied().fold(0.0, f64::max);
        let ref_value = self.threshold * peak;
        let bin_hz = sample_rate as f64 / n_fft as f64;

        let gated = |k: usize| if frame[k] > ref_value { frame[k] } else { 0.0 };

        let mut best_mag = 0.0;
        let mut best_pitch = 0.0;
        let mut found = false;

        for k in 0..n {
            let freq = k as f64 * bin_hz;
            if freq < self.fmin || freq >= self.fmax {
                continue;
            }

            let current = gated(k);
            let left = if k == 0 { current } else { gated(k - 1) };
            let right = if k + 1 == n { current } else { gated(k + 1) };
            if !(current > left && current >= right) {
                continue;
            }

            // Quadratic interpolation uses the ungated neighbours; the
            // outermost bins have no two-sided neighbourhood.
            let (shift, skew) = if k == 0 || k + 1 == n {
                (0.0, 0.0)
            } else {
                let avg = 0.5 * (frame[k + 1] - frame[k - 1]);
                let curvature = 2.0 * frame[k] - frame[k + 1] - frame[k - 1];
                let shift = if curvature.abs() < f64::MIN_POSITIVE {
                    avg
                } else {
                    avg / curvature
                };
                (shift, 0.5 * avg * shift)
            };

            let mag = frame[k] + skew;
            if !found || mag > best_mag {
                best_mag = mag;
                best_pitch = (k as f64 + shift) * bin_hz;
                found = true;
            }
        }

        best_pitch
    }

    /// Mean, standard deviation and variance over voiced frames
    ///
    /// A frame is voiced iff its pitch is > 0. With no voiced frame every
    /// statistic is 0.
    pub fn summarize(pitches: &[f64]) -> PitchStats {
        let voiced: Vec<f64> = pitches.iter().copied().filter(|&p| p > 0.0).collect();
        PitchStats {
            mean: stats::mean(&voiced),
            std: stats::std_dev(&voiced),
            variance: stats::variance(&voiced),
            voiced_frames: voiced.len(),
        }
    }
}
