//! Shared types and data contracts
//!
//! The classification label, the per-call result, and the declared container
//! format handed in by the hosting layer.

use crate::error::DetectError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification outcome
///
/// Class index order is fixed: `AiGenerated = 0`, `Human = 1`. Artifacts,
/// confusion matrices and vote vectors all use this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "AI_GENERATED")]
    AiGenerated,
    #[serde(rename = "HUMAN")]
    Human,
}

impl Label {
    /// Both labels in class index order
    pub const ALL: [Label; 2] = [Label::AiGenerated, Label::Human];

    /// Number of classes
    pub const COUNT: usize = 2;

    /// Class index used by the classifier
    pub fn index(self) -> usize {
        match self {
            Label::AiGenerated => 0,
            Label::Human => 1,
        }
    }

    /// Inverse of [`Label::index`]
    pub fn from_index(index: usize) -> Option<Self> {
        Label::ALL.get(index).copied()
    }

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Label::AiGenerated => "AI_GENERATED",
            Label::Human => "HUMAN",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one classification call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Predicted label
    pub classification: Label,

    /// Vote fraction of the predicted label, in [0, 1]
    ///
    /// This is the ensemble's raw agreement, not a calibrated probability.
    /// Treat thresholds on it as heuristics.
    pub confidence_score: f64,

    /// Rule-based rationale
    pub explanation: String,
}

/// Declared container format of the inbound audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
    Flac,
    Ogg,
}

impl AudioFormat {
    /// File extension, also used as the demuxer probe hint
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
        }
    }

    /// Guess the format from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        ext.parse().ok()
    }

    /// Check the container signature at the start of `bytes`
    ///
    /// MP3 accepts an ID3v2 tag or any MPEG audio frame sync (11 set bits).
    pub fn matches_signature(self, bytes: &[u8]) -> bool {
        match self {
            AudioFormat::Mp3 => {
                bytes.starts_with(b"ID3")
                    || (bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0)
            }
            AudioFormat::Wav => {
                bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
            }
            AudioFormat::Flac => bytes.starts_with(b"fLaC"),
            AudioFormat::Ogg => bytes.starts_with(b"OggS"),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" | "mpeg" => Ok(AudioFormat::Mp3),
            "wav" | "wave" => Ok(AudioFormat::Wav),
            "flac" => Ok(AudioFormat::Flac),
            "ogg" => Ok(AudioFormat::Ogg),
            other => Err(DetectError::Decode(format!(
                "Unsupported audio format: {}",
                other
            ))),
        }
    }
}
