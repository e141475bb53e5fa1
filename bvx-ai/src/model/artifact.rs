//! Persisted model artifact
//!
//! An artifact is two JSON documents, the fitted normalizer and the fitted
//! classifier, each wrapped in an envelope that names its kind and carries
//! the feature layout it was trained against. Both envelopes also carry the
//! artifact id, a SHA-256 over the two payloads, so a normalizer from one
//! training run never loads beside a classifier from another. Loading the
//! pair cross-checks layouts and ids against each other and against the
//! running extractor.

use super::forest::RandomForest;
use super::normalizer::Normalizer;
use crate::error::{DetectError, Result};
use crate::features::{to_hex, FeatureLayout};
use bvx_common::ArtifactPaths;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{error, info};

/// Envelope format version
pub const ARTIFACT_FORMAT_VERSION: u32 = 2;

const NORMALIZER_KIND: &str = "normalizer";
const CLASSIFIER_KIND: &str = "random_forest";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    format_version: u32,
    kind: String,
    /// Absent in v1 documents, which are rejected by version
    #[serde(default)]
    artifact_id: String,
    feature_layout: FeatureLayout,
    payload: T,
}

/// Fitted normalizer and classifier plus their feature layout
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    layout: FeatureLayout,
    normalizer: Normalizer,
    classifier: RandomForest,
}

impl ModelArtifact {
    /// Bundle fitted components
    ///
    /// # Errors
    /// `DetectError::Configuration` if either component was fitted on a
    /// different width than `layout`.
    pub fn new(layout: FeatureLayout, normalizer: Normalizer, classifier: RandomForest) -> Result<Self> {
        if normalizer.n_features() != layout.len() || classifier.n_features() != layout.len() {
            return Err(DetectError::Configuration(format!(
                "Layout has {} features, normalizer {} and classifier {}",
                layout.len(),
                normalizer.n_features(),
                classifier.n_features()
            )));
        }
        Ok(Self {
            layout,
            normalizer,
            classifier,
        })
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn classifier(&self) -> &RandomForest {
        &self.classifier
    }

    /// Hex SHA-256 over the compact normalizer and classifier payloads
    ///
    /// Shared by both documents of one artifact.
    pub fn artifact_id(&self) -> Result<String> {
        payload_id(&self.normalizer, &self.classifier)
    }

    fn envelope<'a, T>(&'a self, kind: &str, artifact_id: &str, payload: &'a T) -> Envelope<&'a T> {
        Envelope {
            format_version: ARTIFACT_FORMAT_VERSION,
            kind: kind.to_string(),
            artifact_id: artifact_id.to_string(),
            feature_layout: self.layout.clone(),
            payload,
        }
    }

    /// Serialized (normalizer, classifier) documents
    pub fn to_documents(&self) -> Result<(String, String)> {
        let id = self.artifact_id()?;
        let normalizer =
            serde_json::to_string_pretty(&self.envelope(NORMALIZER_KIND, &id, &self.normalizer))
                .map_err(|e| DetectError::Artifact(format!("Failed to serialize normalizer: {}", e)))?;
        let classifier =
            serde_json::to_string_pretty(&self.envelope(CLASSIFIER_KIND, &id, &self.classifier))
                .map_err(|e| DetectError::Artifact(format!("Failed to serialize classifier: {}", e)))?;
        Ok((normalizer, classifier))
    }

    /// Hex SHA-256 over both serialized documents
    pub fn checksum(&self) -> Result<String> {
        let (normalizer, classifier) = self.to_documents()?;
        let mut hasher = Sha256::new();
        hasher.update(normalizer.as_bytes());
        hasher.update([0u8]);
        hasher.update(classifier.as_bytes());
        Ok(to_hex(&hasher.finalize()))
    }

    /// Write both documents, each atomically
    pub fn save(&self, paths: &ArtifactPaths) -> Result<()> {
        let (normalizer, classifier) = self.to_documents()?;
        write_atomic(&paths.scaler_path, &normalizer)?;
        write_atomic(&paths.model_path, &classifier)?;

        info!(
            model_path = %paths.model_path.display(),
            scaler_path = %paths.scaler_path.display(),
            "Model artifact saved"
        );
        Ok(())
    }

    /// Load and cross-check both documents
    ///
    /// # Errors
    /// - `ArtifactNotFound`: a file is missing or unreadable
    /// - `Artifact`: a file is not a valid document of the expected kind
    /// - `Configuration`: version or layout disagrees with this build, or
    ///   the two documents come from different training runs
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let result = Self::load_inner(paths);
        match &result {
            Ok(artifact) => info!(
                model_path = %paths.model_path.display(),
                trees = artifact.classifier.n_trees(),
                layout = %artifact.layout.fingerprint(),
                "Model artifact loaded"
            ),
            Err(e) => error!(
                model_path = %paths.model_path.display(),
                scaler_path = %paths.scaler_path.display(),
                "Failed to load model artifact: {}",
                e
            ),
        }
        result
    }

    fn load_inner(paths: &ArtifactPaths) -> Result<Self> {
        let normalizer: Envelope<Normalizer> = read_document(&paths.scaler_path, NORMALIZER_KIND)?;
        let classifier: Envelope<RandomForest> = read_document(&paths.model_path, CLASSIFIER_KIND)?;

        if normalizer.feature_layout != classifier.feature_layout {
            return Err(DetectError::Configuration(
                "Normalizer and classifier were trained on different feature layouts".to_string(),
            ));
        }

        let current = FeatureLayout::current();
        if classifier.feature_layout != current {
            return Err(DetectError::Configuration(format!(
                "Artifact feature layout {} (v{}) does not match extractor layout {} (v{})",
                classifier.feature_layout.fingerprint(),
                classifier.feature_layout.version,
                current.fingerprint(),
                current.version
            )));
        }

        if normalizer.artifact_id != classifier.artifact_id {
            return Err(DetectError::Configuration(format!(
                "Normalizer belongs to artifact {} but classifier to {}",
                short_id(&normalizer.artifact_id),
                short_id(&classifier.artifact_id)
            )));
        }

        normalizer.payload.validate()?;
        classifier.payload.validate()?;

        let id = payload_id(&normalizer.payload, &classifier.payload)?;
        if id != classifier.artifact_id {
            return Err(DetectError::Artifact(format!(
                "Artifact content does not match its id {}",
                short_id(&classifier.artifact_id)
            )));
        }

        Self::new(classifier.feature_layout, normalizer.payload, classifier.payload)
    }
}

fn payload_id(normalizer: &Normalizer, classifier: &RandomForest) -> Result<String> {
    let serialize = |value: std::result::Result<String, serde_json::Error>| {
        value.map_err(|e| DetectError::Artifact(format!("Failed to serialize payload: {}", e)))
    };
    let mut hasher = Sha256::new();
    hasher.update(serialize(serde_json::to_string(normalizer))?.as_bytes());
    hasher.update([0u8]);
    hasher.update(serialize(serde_json::to_string(classifier))?.as_bytes());
    Ok(to_hex(&hasher.finalize()))
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

fn read_document<T: DeserializeOwned>(path: &Path, kind: &str) -> Result<Envelope<T>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        DetectError::ArtifactNotFound(format!("{}: {}", path.display(), e))
    })?;

    // Check the header first so a wrong file gets a precise message
    let header: Envelope<serde_json::Value> = serde_json::from_str(&text).map_err(|e| {
        DetectError::Artifact(format!("{}: not a model document: {}", path.display(), e))
    })?;
    if header.kind != kind {
        return Err(DetectError::Artifact(format!(
            "{}: expected '{}' document, found '{}'",
            path.display(),
            kind,
            header.kind
        )));
    }
    if header.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(DetectError::Configuration(format!(
            "{}: artifact format v{} is not supported (expected v{})",
            path.display(),
            header.format_version,
            ARTIFACT_FORMAT_VERSION
        )));
    }

    serde_json::from_str(&text).map_err(|e| {
        DetectError::Artifact(format!("{}: invalid {} payload: {}", path.display(), kind, e))
    })
}

/// Write `contents` to a temp file beside `path`, then rename over it
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| DetectError::Io(e.error))?;
    Ok(())
}
