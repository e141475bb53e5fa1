//! WAV fixture generator
//!
//! Builds 16-bit PCM WAV files in memory with hound.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::io::Cursor;
use std::path::Path;

/// Waveform content of a fixture
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    /// Steady tone at the given frequency (Hz)
    Sine(f64),
    /// Tone with sinusoidal pitch wobble: (centre Hz, depth Hz, rate Hz)
    Vibrato(f64, f64, f64),
    /// Linear sweep between two frequencies (Hz)
    Chirp(f64, f64),
    /// Uniform white noise from a seed
    Noise(u64),
    Silence,
}

#[derive(Debug, Clone)]
pub struct WavFixture {
    pub signal: Signal,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub amplitude: f64,
}

impl Default for WavFixture {
    fn default() -> Self {
        Self {
            signal: Signal::Sine(220.0),
            duration_seconds: 1.0,
            sample_rate: 22050,
            channels: 1,
            amplitude: 0.4,
        }
    }
}

impl WavFixture {
    pub fn new(signal: Signal) -> Self {
        Self {
            signal,
            ..Self::default()
        }
    }

    pub fn seconds(mut self, duration: f64) -> Self {
        self.duration_seconds = duration;
        self
    }

    pub fn rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn stereo(mut self) -> Self {
        self.channels = 2;
        self
    }

    fn samples(&self) -> Vec<f64> {
        let n = (self.duration_seconds * self.sample_rate as f64) as usize;
        let sr = self.sample_rate as f64;
        let a = self.amplitude;
        match self.signal {
            Signal::Sine(f) => (0..n).map(|i| a * (2.0 * PI * f * i as f64 / sr).sin()).collect(),
            Signal::Vibrato(f, depth, rate) => {
                let mut phase = 0.0;
                (0..n)
                    .map(|i| {
                        let t = i as f64 / sr;
                        let inst = f + depth * (2.0 * PI * rate * t).sin();
                        phase += 2.0 * PI * inst / sr;
                        a * phase.sin()
                    })
                    .collect()
            }
            Signal::Chirp(f0, f1) => {
                let duration = self.duration_seconds.max(f64::MIN_POSITIVE);
                (0..n)
                    .map(|i| {
                        let t = i as f64 / sr;
                        let phase = 2.0 * PI * (f0 * t + (f1 - f0) * t * t / (2.0 * duration));
                        a * phase.sin()
                    })
                    .collect()
            }
            Signal::Noise(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..n).map(|_| a * rng.gen_range(-1.0..1.0)).collect()
            }
            Signal::Silence => vec![0.0; n],
        }
    }

    /// Encoded WAV bytes
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for s in self.samples() {
                let value = (s.clamp(-1.0, 1.0) * i16::MAX as f64) as i16;
                for _ in 0..self.channels {
                    writer.write_sample(value)?;
                }
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}

/// Write `fixture` to `path`, creating parent directories
pub fn write_fixture(path: &Path, fixture: &WavFixture) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, fixture.to_bytes()?)?;
    Ok(())
}
