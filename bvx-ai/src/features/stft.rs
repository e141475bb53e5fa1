//! Short-time Fourier transform and its inverse
//!
//! Frames are centred: the signal is zero-padded by `n_fft / 2` on both
//! sides, so frame `t` is centred on sample `t * hop`. A periodic Hann window
//! is used for analysis and synthesis.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Periodic Hann window of length `n`
pub fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// Complex spectrogram, stored frame-major: `frames[t][bin]`
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub frames: Vec<Vec<Complex<f64>>>,
    pub n_fft: usize,
    pub hop: usize,
}

impl Spectrogram {
    /// Number of analysis frames
    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of non-negative frequency bins (`n_fft / 2 + 1`)
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Magnitude spectrogram `|X|`, frame-major
    pub fn magnitude(&self) -> Vec<Vec<f64>> {
        self.frames
            .iter()
            .map(|frame| frame.iter().map(|c| c.norm()).collect())
            .collect()
    }

    /// Centre frequency of every bin in Hz
    pub fn bin_frequencies(&self, sample_rate: u32) -> Vec<f64> {
        (0..self.n_bins())
            .map(|k| k as f64 * sample_rate as f64 / self.n_fft as f64)
            .collect()
    }
}

/// Forward/inverse STFT with cached FFT plans
pub struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f64>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            n_fft,
            hop,
            window: hann_window(n_fft),
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Centred, Hann-windowed STFT of `signal`
    pub fn forward(&self, signal: &[f64]) -> Spectrogram {
        let pad = self.n_fft / 2;
        let mut padded = vec![0.0; signal.len() + 2 * pad];
        padded[pad..pad + signal.len()].copy_from_slice(signal);

        let n_frames = 1 + (padded.len() - self.n_fft) / self.hop;
        let n_bins = self.n_fft / 2 + 1;
        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];
        let mut frames = Vec::with_capacity(n_frames);

        for t in 0..n_frames {
            let start = t * self.hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * self.window[i], 0.0);
            }
            self.forward.process(&mut buffer);
            frames.push(buffer[..n_bins].to_vec());
        }

        Spectrogram {
            frames,
            n_fft: self.n_fft,
            hop: self.hop,
        }
    }

    /// Inverse STFT by weighted overlap-add, trimmed to `length` samples
    pub fn inverse(&self, spec: &Spectrogram, length: usize) -> Vec<f64> {
        let pad = self.n_fft / 2;
        let total = self.n_fft + self.hop * spec.n_frames().saturating_sub(1);
        let mut output = vec![0.0; total];
        let mut window_sum = vec![0.0; total];
        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];
        let scale = 1.0 / self.n_fft as f64;

        for (t, frame) in spec.frames.iter().enumerate() {
            // Rebuild the Hermitian-symmetric full spectrum
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = if k < frame.len() {
                    frame[k]
                } else {
                    frame[self.n_fft - k].conj()
                };
            }
            self.inverse.process(&mut buffer);

            let start = t * self.hop;
            for i in 0..self.n_fft {
                let w = self.window[i];
                output[start + i] += buffer[i].re * scale * w;
                window_sum[start + i] += w * w;
            }
        }

        for (sample, &norm) in output.iter_mut().zip(&window_sum) {
            if norm > f64::MIN_POSITIVE {
                *sample /= norm;
            }
        }

        let mut signal: Vec<f64> = output.into_iter().skip(pad).take(length).collect();
        signal.resize(length, 0.0);
        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_hann_window_shape() {
        let w = hann_window(8);
        assert_eq!(w.len(), 8);
        assert!(w[0].abs() < 1e-12);
        assert!((w[4] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_frame_count_is_centred() {
        let stft = Stft::new(2048, 512);
        let spec = stft.forward(&vec![0.0; 22050]);
        assert_eq!(spec.n_frames(), 1 + 22050 / 512);
        assert_eq!(spec.n_bins(), 1025);
        assert!(spec.frames.iter().all(|f| f.len() == 1025));
    }

    #[test]
    fn test_short_signal_still_framed() {
        let stft = Stft::new(2048, 512);
        let spec = stft.forward(&[0.5; 10]);
        assert_eq!(spec.n_frames(), 1);
    }

    #[test]
    fn test_peak_at_tone_bin() {
        let sr = 22050.0;
        let stft = Stft::new(2048, 512);
        let spec = stft.forward(&sine(1000.0, sr, 22050));
        let mag = spec.magnitude();
        let mid = &mag[mag.len() / 2];

        let peak = mid
            .iter()
            .enumerate()
            .fold((0, 0.0), |best, (k, &m)| if m > best.1 { (k, m) } else { best })
            .0;
        let expected = (1000.0 * 2048.0 / sr).round() as usize;
        assert!((peak as i64 - expected as i64).abs() <= 1, "peak bin {}", peak);
    }

    #[test]
    fn test_inverse_reconstructs_signal() {
        let stft = Stft::new(512, 128);
        let signal = sine(440.0, 16000.0, 4000);
        let spec = stft.forward(&signal);
        let rebuilt = stft.inverse(&spec, signal.len());

        assert_eq!(rebuilt.len(), signal.len());
        let max_err = signal
            .iter()
            .zip(&rebuilt)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        assert!(max_err < 1e-6, "max reconstruction error {}", max_err);
    }
}
