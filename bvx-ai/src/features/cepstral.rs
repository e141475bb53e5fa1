//! Mel-frequency cepstral coefficients
//!
//! Power spectrogram → Slaney-normalised mel filterbank → dB (80 dB floor
//! below the peak) → orthonormal DCT-II, keeping the first `n_mfcc`
//! coefficients per frame.

use std::f64::consts::PI;

const AMIN: f64 = 1e-10;
const TOP_DB: f64 = 80.0;

/// Hz → mel (Slaney: linear below 1 kHz, logarithmic above)
pub fn hz_to_mel(hz: f64) -> f64 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = (6.4f64).ln() / 27.0;

    if hz >= min_log_hz {
        min_log_mel + (hz / min_log_hz).ln() / logstep
    } else {
        hz / f_sp
    }
}

/// Mel → Hz, inverse of [`hz_to_mel`]
pub fn mel_to_hz(mel: f64) -> f64 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = (6.4f64).ln() / 27.0;

    if mel >= min_log_mel {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    } else {
        f_sp * mel
    }
}

/// Triangular mel filterbank, `[n_mels][n_bins]`, area-normalised
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f64>> {
    let n_bins = n_fft / 2 + 1;
    let fft_freqs: Vec<f64> = (0..n_bins)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let mel_max = hz_to_mel(sample_rate as f64 / 2.0);
    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lower, center, upper) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
            let enorm = 2.0 / (upper - lower);
            fft_freqs
                .iter()
                .map(|&f| {
                    let rising = (f - lower) / (center - lower);
                    let falling = (upper - f) / (upper - center);
                    rising.min(falling).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II of `input`, first `n_out` coefficients
fn dct_ortho(input: &[f64], n_out: usize) -> Vec<f64> {
    let n = input.len() as f64;
    (0..n_out)
        .map(|k| {
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                .sum();
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            sum * scale
        })
        .collect()
}

/// Per-frame MFCCs from a magnitude spectrogram
///
/// Returns `[n_frames][n_mfcc]`. The dB floor is taken relative to the
/// loudest mel cell of the whole recording.
pub fn mfcc(magnitude: &[Vec<f64>], filterbank: &[Vec<f64>], n_mfcc: usize) -> Vec<Vec<f64>> {
    let mel_db: Vec<Vec<f64>> = magnitude
        .iter()
        .map(|frame| {
            filterbank
                .iter()
                .map(|filter| {
                    let energy: f64 = filter
                        .iter()
                        .zip(frame)
                        .map(|(&w, &m)| w * m * m)
                        .sum();
                    10.0 * energy.max(AMIN).log10()
                })
                .collect::<Vec<f64>>()
        })
        .collect();

    let peak = mel_db
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let floor = peak - TOP_DB;

    mel_db
        .into_iter()
        .map(|frame| {
            let clamped: Vec<f64> = frame.into_iter().map(|db| db.max(floor)).collect();
            dct_ortho(&clamped, n_mfcc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_scale_roundtrip() {
        for hz in [0.0, 440.0, 999.0, 1000.0, 4000.0, 11025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6, "hz {}", hz);
        }
    }

    #[test]
    fn test_filterbank_shape_and_nonnegative() {
        let fb = mel_filterbank(22050, 2048, 128);
        assert_eq!(fb.len(), 128);
        assert!(fb.iter().all(|f| f.len() == 1025));
        assert!(fb.iter().flatten().all(|&w| w >= 0.0));
        // every filter covers at least one bin above 100 Hz
        assert!(fb[20..].iter().all(|f| f.iter().any(|&w| w > 0.0)));
    }

    #[test]
    fn test_dct_of_constant_is_dc_only() {
        let coeffs = dct_ortho(&[3.0; 16], 5);
        assert!((coeffs[0] - 3.0 * 4.0).abs() < 1e-9);
        assert!(coeffs[1..].iter().all(|c| c.abs() < 1e-9));
    }

    #[test]
    fn test_mfcc_of_silence_is_finite() {
        let fb = mel_filterbank(22050, 2048, 128);
        let magnitude = vec![vec![0.0; 1025]; 4];
        let coeffs = mfcc(&magnitude, &fb, 13);
        assert_eq!(coeffs.len(), 4);
        assert!(coeffs.iter().flatten().all(|c| c.is_finite()));
    }
}
