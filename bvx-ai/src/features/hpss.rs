//! Harmonic/percussive source separation by median filtering
//!
//! Harmonic content is smooth along time, percussive content is smooth along
//! frequency. Median-filtering the magnitude spectrogram in each direction
//! gives two enhanced spectrograms; Wiener-style soft masks built from them
//! split the complex STFT, and the inverse STFT returns two waveforms.

use super::stft::{Spectrogram, Stft};
use rustfft::num_complex::Complex;

/// Harmonic/percussive descriptors of one recording
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicStats {
    /// Harmonic energy / percussive energy (harmonic energy itself when the
    /// percussive energy is not positive)
    pub hnr: f64,
    /// Mean absolute amplitude of the harmonic component
    pub harmonic_mean: f64,
    /// Mean absolute amplitude of the percussive component
    pub percussive_mean: f64,
}

/// Median of `window` (sorted in place)
fn median(window: &mut [f64]) -> f64 {
    window.sort_by(|a, b| a.total_cmp(b));
    window[window.len() / 2]
}

/// Mirror an out-of-range index back into `0..len` (half-sample symmetric)
fn reflect(index: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - 1 - i;
    }
    i as usize
}

/// Median filter along the time axis (per frequency bin)
fn median_over_time(magnitude: &[Vec<f64>], kernel: usize) -> Vec<Vec<f64>> {
    let n_frames = magnitude.len();
    let n_bins = magnitude.first().map_or(0, Vec::len);
    let half = (kernel / 2) as isize;
    let mut window = vec![0.0; kernel];
    let mut out = vec![vec![0.0; n_bins]; n_frames];

    for k in 0..n_bins {
        for t in 0..n_frames {
            for (j, slot) in window.iter_mut().enumerate() {
                let src = reflect(t as isize + j as isize - half, n_frames);
                *slot = magnitude[src][k];
            }
            out[t][k] = median(&mut window);
        }
    }
    out
}

/// Median filter along the frequency axis (per frame)
fn median_over_frequency(magnitude: &[Vec<f64>], kernel: usize) -> Vec<Vec<f64>> {
    let half = (kernel / 2) as isize;
    let mut window = vec![0.0; kernel];

    magnitude
        .iter()
        .map(|frame| {
            let n_bins = frame.len();
            (0..n_bins)
                .map(|k| {
                    for (j, slot) in window.iter_mut().enumerate() {
                        *slot = frame[reflect(k as isize + j as isize - half, n_bins)];
                    }
                    median(&mut window)
                })
                .collect()
        })
        .collect()
}

/// Power-2 soft mask of `x` against `reference`; 0.5 where both vanish
fn soft_mask(x: f64, reference: f64) -> f64 {
    let z = x.max(reference);
    if z <= f64::MIN_POSITIVE {
        return 0.5;
    }
    let m = (x / z).powi(2);
    let r = (reference / z).powi(2);
    m / (m + r)
}

/// Split `spec` into harmonic and percussive waveforms of `length` samples
pub fn separate(stft: &Stft, spec: &Spectrogram, kernel: usize, length: usize) -> (Vec<f64>, Vec<f64>) {
    let kernel = kernel.max(1) | 1;
    let magnitude = spec.magnitude();
    let harmonic_enh = median_over_time(&magnitude, kernel);
    let percussive_enh = median_over_frequency(&magnitude, kernel);

    let mut harmonic = spec.clone();
    let mut percussive = spec.clone();

    for t in 0..spec.n_frames() {
        for k in 0..spec.n_bins() {
            let h = harmonic_enh[t][k];
            let p = percussive_enh[t][k];
            let bin: Complex<f64> = spec.frames[t][k];
            harmonic.frames[t][k] = bin * soft_mask(h, p);
            percussive.frames[t][k] = bin * soft_mask(p, h);
        }
    }

    (stft.inverse(&harmonic, length), stft.inverse(&percussive, length))
}

/// Summarize separated components
pub fn harmonic_stats(harmonic: &[f64], percussive: &[f64]) -> HarmonicStats {
    let harmonic_energy: f64 = harmonic.iter().map(|x| x * x).sum();
    let percussive_energy: f64 = percussive.iter().map(|x| x * x).sum();

    let hnr = if percussive_energy > 0.0 {
        harmonic_energy / percussive_energy
    } else {
        harmonic_energy
    };

    let mean_abs = |xs: &[f64]| {
        if xs.is_empty() {
            0.0
        } else {
            xs.iter().map(|x| x.abs()).sum::<f64>() / xs.len() as f64
        }
    };

    HarmonicStats {
        hnr,
        harmonic_mean: mean_abs(harmonic),
        percussive_mean: mean_abs(percussive),
    }
}
