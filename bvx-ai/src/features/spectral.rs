//! Spectral shape descriptors and zero-crossing rate
//!
//! Shape descriptors are computed per frame on the magnitude spectrum; a
//! silent frame yields 0 for every descriptor.

/// Per-frame spectral centroid in Hz
pub fn centroid(magnitude: &[Vec<f64>], freqs: &[f64]) -> Vec<f64> {
    magnitude
        .iter()
        .map(|frame| {
            let total: f64 = frame.iter().sum();
            if total <= f64::MIN_POSITIVE {
                return 0.0;
            }
            frame.iter().zip(freqs).map(|(&m, &f)| m * f).sum::<f64>() / total
        })
        .collect()
}

/// Per-frame second-order spectral bandwidth around the centroid, in Hz
pub fn bandwidth(magnitude: &[Vec<f64>], freqs: &[f64], centroids: &[f64]) -> Vec<f64> {
    magnitude
        .iter()
        .zip(centroids)
        .map(|(frame, &c)| {
            let total: f64 = frame.iter().sum();
            if total <= f64::MIN_POSITIVE {
                return 0.0;
            }
            let spread: f64 = frame
                .iter()
                .zip(freqs)
                .map(|(&m, &f)| (m / total) * (f - c).powi(2))
                .sum();
            spread.sqrt()
        })
        .collect()
}

/// Per-frame roll-off: lowest frequency below which `roll_percent` of the
/// magnitude is concentrated
pub fn rolloff(magnitude: &[Vec<f64>], freqs: &[f64], roll_percent: f64) -> Vec<f64> {
    magnitude
        .iter()
        .map(|frame| {
            let total: f64 = frame.iter().sum();
            if total <= f64::MIN_POSITIVE {
                return 0.0;
            }
            let threshold = roll_percent * total;
            let mut cumulative = 0.0;
            for (&m, &f) in frame.iter().zip(freqs) {
                cumulative += m;
                if cumulative >= threshold {
                    return f;
                }
            }
            freqs.last().copied().unwrap_or(0.0)
        })
        .collect()
}

/// Per-frame zero-crossing rate over centred frames
///
/// The signal is edge-padded by `frame_length / 2`; values with magnitude
/// at or below 1e-10 count as zero, and zero counts as positive.
pub fn zero_crossing_rate(signal: &[f64], frame_length: usize, hop: usize) -> Vec<f64> {
    if signal.is_empty() || frame_length == 0 || hop == 0 {
        return Vec::new();
    }

    let pad = frame_length / 2;
    let first = signal[0];
    let last = signal[signal.len() - 1];
    let padded: Vec<f64> = std::iter::repeat(first)
        .take(pad)
        .chain(signal.iter().copied())
        .chain(std::iter::repeat(last).take(pad))
        .collect();

    let negative: Vec<bool> = padded
        .iter()
        .map(|&x| x.abs() > 1e-10 && x < 0.0)
        .collect();

    if padded.len() < frame_length {
        return vec![0.0];
    }

    let n_frames = 1 + (padded.len() - frame_length) / hop;
    (0..n_frames)
        .map(|t| {
            let frame = &negative[t * hop..t * hop + frame_length];
            let crossings = frame.windows(2).filter(|w| w[0] != w[1]).count();
            crossings as f64 / frame_length as f64
        })
        .collect()
}
