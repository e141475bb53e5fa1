//! Voice feature extraction
//!
//! Turns a [`Waveform`] into 40 named scalar descriptors: cepstral
//! statistics, spectral shape, zero-crossing rate, pitch and
//! harmonic/percussive balance. The name order is fixed by
//! [`FeatureLayout`], and every artifact carries the layout it was trained
//! against.

pub mod cepstral;
pub mod hpss;
pub mod pitch;
pub mod spectral;
pub mod stats;
pub mod stft;

use crate::audio::resampler::Resampler;
use crate::audio::{AudioDecoder, Waveform};
use crate::error::{DetectError, Result};
use crate::types::AudioFormat;
use pitch::PitchTracker;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stft::Stft;
use tracing::{debug, warn};

/// Number of cepstral coefficients in the canonical layout
pub const N_MFCC: usize = 13;

/// Length of the canonical feature vector
pub const FEATURE_COUNT: usize = 2 * N_MFCC + 6 + 2 + 3 + 3;

/// Version of the canonical name list; bump on any reordering or rename
pub const LAYOUT_VERSION: u32 = 1;

/// Extraction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Working sample rate (Hz)
    pub sample_rate: u32,
    pub n_mfcc: usize,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    /// Energy fraction for spectral roll-off
    pub rolloff_percent: f64,
    pub pitch_fmin: f64,
    pub pitch_fmax: f64,
    /// Pitch candidate gate, relative to the frame peak
    pub pitch_threshold: f64,
    /// Median filter width for harmonic/percussive separation (odd)
    pub hpss_kernel: usize,
    pub min_duration_secs: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::audio::DEFAULT_TARGET_SAMPLE_RATE,
            n_mfcc: N_MFCC,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            rolloff_percent: 0.85,
            pitch_fmin: 150.0,
            pitch_fmax: 4000.0,
            pitch_threshold: 0.1,
            hpss_kernel: 31,
            min_duration_secs: crate::audio::DEFAULT_MIN_DURATION_SECS,
        }
    }
}

/// Canonical, versioned feature-name ordering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureLayout {
    pub version: u32,
    pub names: Vec<String>,
}

impl FeatureLayout {
    /// Layout produced by the default extractor
    pub fn current() -> Self {
        Self::with_mfcc(N_MFCC)
    }

    /// Layout for an extractor keeping `n_mfcc` cepstral coefficients
    pub fn with_mfcc(n_mfcc: usize) -> Self {
        let mut names = Vec::with_capacity(2 * n_mfcc + 14);
        names.extend((0..n_mfcc).map(|i| format!("mfcc_{}_mean", i)));
        names.extend((0..n_mfcc).map(|i| format!("mfcc_{}_std", i)));
        names.extend(
            [
                "spectral_centroid_mean",
                "spectral_centroid_std",
                "spectral_rolloff_mean",
                "spectral_rolloff_std",
                "spectral_bandwidth_mean",
                "spectral_bandwidth_std",
                "zcr_mean",
                "zcr_std",
                "pitch_mean",
                "pitch_std",
                "pitch_variance",
                "hnr",
                "harmonic_mean",
                "percussive_mean",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        Self {
            version: LAYOUT_VERSION,
            names,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of `name`, if present
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Hex SHA-256 over the version and the newline-joined names
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_le_bytes());
        for name in &self.names {
            hasher.update(name.as_bytes());
            hasher.update(b"\n");
        }
        to_hex(&hasher.finalize())
    }
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Named feature values in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMap {
    entries: Vec<(String, f64)>,
}

impl FeatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `name`
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Feature names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Serialize into `layout` order
    ///
    /// # Errors
    /// `DetectError::Configuration` if a layout name is missing or the map
    /// carries names the layout does not know.
    pub fn to_vector(&self, layout: &FeatureLayout) -> Result<FeatureVector> {
        if self.entries.len() != layout.len() {
            return Err(DetectError::Configuration(format!(
                "Feature map has {} entries, layout expects {}",
                self.entries.len(),
                layout.len()
            )));
        }
        let values = layout
            .names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| {
                    DetectError::Configuration(format!("Feature '{}' missing from map", name))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(FeatureVector(values))
    }
}

/// Ordered feature values matching a [`FeatureLayout`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    /// Re-attach names from `layout`
    pub fn to_map(&self, layout: &FeatureLayout) -> Result<FeatureMap> {
        if self.0.len() != layout.len() {
            return Err(DetectError::Configuration(format!(
                "Feature vector has {} values, layout expects {}",
                self.0.len(),
                layout.len()
            )));
        }
        let mut map = FeatureMap::new();
        for (name, &value) in layout.names.iter().zip(&self.0) {
            map.insert(name.clone(), value);
        }
        Ok(map)
    }
}

/// Computes the canonical feature set from audio
///
/// Holds the FFT plans and mel filterbank so repeated extraction does not
/// rebuild them. Shareable across threads.
pub struct FeatureExtractor {
    config: ExtractorConfig,
    layout: FeatureLayout,
    decoder: AudioDecoder,
    stft: Stft,
    filterbank: Vec<Vec<f64>>,
    pitch: PitchTracker,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

impl FeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let filterbank = cepstral::mel_filterbank(config.sample_rate, config.n_fft, config.n_mels);
        Self {
            layout: FeatureLayout::with_mfcc(config.n_mfcc),
            decoder: AudioDecoder::new(config.sample_rate, config.min_duration_secs),
            stft: Stft::new(config.n_fft, config.hop_length),
            pitch: PitchTracker {
                fmin: config.pitch_fmin,
                fmax: config.pitch_fmax,
                threshold: config.pitch_threshold,
            },
            filterbank,
            config,
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Name ordering of this extractor's output
    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    pub fn decoder(&self) -> &AudioDecoder {
        &self.decoder
    }

    /// Decode then extract
    pub fn extract_bytes(&self, bytes: &[u8], format: AudioFormat) -> Result<FeatureMap> {
        let waveform = self.decoder.decode(bytes, format)?;
        self.extract(&waveform)
    }

    /// Extract and serialize into layout order
    pub fn extract_vector(&self, waveform: &Waveform) -> Result<FeatureVector> {
        self.extract(waveform)?.to_vector(&self.layout)
    }

    /// Compute every feature of `waveform`
    ///
    /// **Algorithm:**
    /// 1. Resample to the working rate if needed
    /// 2. One centred STFT shared by cepstral, spectral, pitch and HPSS stages
    /// 3. Reduce each per-frame series to mean and standard deviation
    /// 4. Replace any non-finite value with 0
    pub fn extract(&self, waveform: &Waveform) -> Result<FeatureMap> {
        let sr = self.config.sample_rate;
        let signal: Vec<f64> = if waveform.sample_rate() == sr {
            waveform.samples().iter().map(|&s| s as f64).collect()
        } else {
            Resampler::resample_mono(waveform.samples(), waveform.sample_rate(), sr)?
                .into_iter()
                .map(|s| s as f64)
                .collect()
        };
        if signal.is_empty() {
            return Err(DetectError::Decode("Waveform is empty".to_string()));
        }

        let spec = self.stft.forward(&signal);
        let magnitude = spec.magnitude();
        let freqs = spec.bin_frequencies(sr);

        let mut values: Vec<f64> = Vec::with_capacity(self.layout.len());

        // Cepstral
        let mfcc = cepstral::mfcc(&magnitude, &self.filterbank, self.config.n_mfcc);
        let columns: Vec<Vec<f64>> = (0..self.config.n_mfcc)
            .map(|c| mfcc.iter().map(|frame| frame[c]).collect())
            .collect();
        values.extend(columns.iter().map(|col| stats::mean(col)));
        values.extend(columns.iter().map(|col| stats::std_dev(col)));

        // Spectral shape
        let centroids = spectral::centroid(&magnitude, &freqs);
        let rolloffs = spectral::rolloff(&magnitude, &freqs, self.config.rolloff_percent);
        let bandwidths = spectral::bandwidth(&magnitude, &freqs, &centroids);
        for series in [&centroids, &rolloffs, &bandwidths] {
            let (m, s) = stats::mean_std(series);
            values.push(m);
            values.push(s);
        }

        // Zero-crossing rate
        let zcr = spectral::zero_crossing_rate(&signal, self.config.n_fft, self.config.hop_length);
        let (zcr_mean, zcr_std) = stats::mean_std(&zcr);
        values.push(zcr_mean);
        values.push(zcr_std);

        // Pitch
        let pitches = self.pitch.track(&magnitude, sr, self.config.n_fft);
        let pitch = PitchTracker::summarize(&pitches);
        values.push(pitch.mean);
        values.push(pitch.std);
        values.push(pitch.variance);

        // Harmonic / percussive
        let (harmonic, percussive) =
            hpss::separate(&self.stft, &spec, self.config.hpss_kernel, signal.len());
        let hp = hpss::harmonic_stats(&harmonic, &percussive);
        values.push(hp.hnr);
        values.push(hp.harmonic_mean);
        values.push(hp.percussive_mean);

        debug!(
            frames = spec.n_frames(),
            voiced_frames = pitch.voiced_frames,
            hnr = hp.hnr,
            "Feature extraction complete"
        );

        let mut map = FeatureMap::new();
        for (name, value) in self.layout.names.iter().zip(values) {
            let value = if value.is_finite() {
                value
            } else {
                warn!(feature = %name, "Non-finite feature value replaced with 0");
                0.0
            };
            map.insert(name.clone(), value);
        }
        Ok(map)
    }
}
