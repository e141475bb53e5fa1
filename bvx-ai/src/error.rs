//! Error types for bvx-ai
//!
//! Every failure is classified as either a client fault (malformed audio) or
//! an operational fault (missing or incompatible model state) so a hosting
//! layer can map it without string matching.

use thiserror::Error;

/// Who is responsible for a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The caller supplied unusable input
    Client,
    /// The serving process is missing or has incompatible model state
    Operational,
}

/// Main error type for bvx-ai
#[derive(Debug, Error)]
pub enum DetectError {
    /// Bytes are not decodable audio, do not match the declared format, or
    /// are shorter than the minimum duration
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Feature dimensionality or layout does not match the fitted artifact
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An artifact file is missing or unreadable
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// An artifact file was read but its content is not a valid artifact
    #[error("Invalid artifact: {0}")]
    Artifact(String),

    /// Training could not produce a model
    #[error("Training error: {0}")]
    Training(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// bvx-common error
    #[error("Common error: {0}")]
    Common(#[from] bvx_common::Error),
}

impl DetectError {
    /// Classify this error for the hosting layer
    pub fn fault(&self) -> Fault {
        match self {
            DetectError::Decode(_) => Fault::Client,
            _ => Fault::Operational,
        }
    }

    /// Short stable code for structured error bodies
    pub fn code(&self) -> &'static str {
        match self {
            DetectError::Decode(_) => "DECODE_ERROR",
            DetectError::Configuration(_) => "CONFIGURATION_ERROR",
            DetectError::ArtifactNotFound(_) => "ARTIFACT_NOT_FOUND",
            DetectError::Artifact(_) => "INVALID_ARTIFACT",
            DetectError::Training(_) => "TRAINING_ERROR",
            DetectError::Io(_) => "IO_ERROR",
            DetectError::Common(_) => "COMMON_ERROR",
        }
    }

    /// Rebuild an equivalent error from a code and message
    ///
    /// Used to replay a cached failure; `Io` and `Common` collapse into
    /// `ArtifactNotFound` since they can only arise while loading artifacts.
    pub(crate) fn replay(code: &'static str, message: &str) -> Self {
        match code {
            "DECODE_ERROR" => DetectError::Decode(message.to_string()),
            "CONFIGURATION_ERROR" => DetectError::Configuration(message.to_string()),
            "INVALID_ARTIFACT" => DetectError::Artifact(message.to_string()),
            "TRAINING_ERROR" => DetectError::Training(message.to_string()),
            _ => DetectError::ArtifactNotFound(message.to_string()),
        }
    }

    /// Message without the variant prefix
    pub(crate) fn detail(&self) -> String {
        match self {
            DetectError::Decode(m)
            | DetectError::Configuration(m)
            | DetectError::ArtifactNotFound(m)
            | DetectError::Artifact(m)
            | DetectError::Training(m) => m.clone(),
            DetectError::Io(e) => e.to_string(),
            DetectError::Common(e) => e.to_string(),
        }
    }
}

/// Convenience Result type using bvx-ai DetectError
pub type Result<T> = std::result::Result<T, DetectError>;
