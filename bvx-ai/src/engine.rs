//! Inference engine
//!
//! Owns the model artifact handle and runs
//! decode → extract → normalize → classify → explain.
//!
//! The handle starts `Unloaded`. The first call loads the artifact under a
//! mutex so concurrent first callers trigger exactly one load, then
//! publishes the outcome through a `RwLock`. A failed load is cached and
//! replayed to every caller until [`InferenceEngine::reload`] succeeds.
//! Published artifacts are never mutated: [`InferenceEngine::swap`]
//! replaces the `Arc`, and in-flight calls keep the one they started with.

use crate::error::{DetectError, Result};
use crate::explain::ExplanationGenerator;
use crate::features::{FeatureExtractor, FeatureMap};
use crate::model::ModelArtifact;
use crate::types::{AudioFormat, ClassificationResult};
use bvx_common::{ArtifactPaths, BootstrapConfig};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
enum HandleState {
    Unloaded,
    Loaded(Arc<ModelArtifact>),
    Failed { code: &'static str, message: String },
}

/// Shared, thread-safe classifier front end
///
/// Construct once per process and share by reference or `Arc`.
pub struct InferenceEngine {
    paths: ArtifactPaths,
    extractor: FeatureExtractor,
    explainer: ExplanationGenerator,
    state: RwLock<HandleState>,
    load_guard: Mutex<()>,
}

impl InferenceEngine {
    /// Engine that loads from `paths` on first use; touches no storage here
    pub fn new(paths: ArtifactPaths) -> Self {
        Self::with_components(paths, FeatureExtractor::default(), ExplanationGenerator::default())
    }

    /// Engine with resolved default paths (environment, config file, defaults)
    pub fn from_environment() -> Self {
        Self::new(ArtifactPaths::resolve())
    }

    /// Engine with paths resolved against an explicit TOML bootstrap file
    ///
    /// Environment overrides still apply on top of the file.
    ///
    /// # Errors
    /// `DetectError::Common` if the file cannot be read or parsed.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let config = BootstrapConfig::from_file(path)?;
        debug!(path = %path.display(), "Resolving artifact paths from config file");
        Ok(Self::new(ArtifactPaths::resolve_with(&config)))
    }

    pub fn with_components(
        paths: ArtifactPaths,
        extractor: FeatureExtractor,
        explainer: ExplanationGenerator,
    ) -> Self {
        Self {
            paths,
            extractor,
            explainer,
            state: RwLock::new(HandleState::Unloaded),
            load_guard: Mutex::new(()),
        }
    }

    /// Engine already holding `artifact`
    pub fn with_artifact(artifact: ModelArtifact) -> Result<Self> {
        let engine = Self::new(ArtifactPaths::default());
        engine.swap(artifact)?;
        Ok(engine)
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.read_state(), HandleState::Loaded(_))
    }

    fn read_state(&self) -> HandleState {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn publish(&self, state: HandleState) -> HandleState {
        let mut slot = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *slot, state)
    }

    fn resolve(state: HandleState) -> Option<Result<Arc<ModelArtifact>>> {
        match state {
            HandleState::Loaded(artifact) => Some(Ok(artifact)),
            HandleState::Failed { code, message } => Some(Err(DetectError::replay(code, &message))),
            HandleState::Unloaded => None,
        }
    }

    /// Load from storage and publish the outcome; caller holds `load_guard`
    fn load_and_publish(&self) -> Result<Arc<ModelArtifact>> {
        let outcome = ModelArtifact::load(&self.paths).and_then(|artifact| {
            self.check_layout(&artifact)?;
            Ok(artifact)
        });
        match outcome {
            Ok(artifact) => {
                let artifact = Arc::new(artifact);
                self.publish(HandleState::Loaded(Arc::clone(&artifact)));
                Ok(artifact)
            }
            Err(e) => {
                if self.is_loaded() {
                    warn!("Reload failed, keeping the current artifact: {}", e);
                    return Err(e);
                }
                warn!("Classifier unavailable until artifacts are fixed: {}", e);
                self.publish(HandleState::Failed {
                    code: e.code(),
                    message: e.detail(),
                });
                Err(e)
            }
        }
    }

    fn check_layout(&self, artifact: &ModelArtifact) -> Result<()> {
        if artifact.layout() != self.extractor.layout() {
            return Err(DetectError::Configuration(format!(
                "Artifact layout {} does not match extractor layout {}",
                artifact.layout().fingerprint(),
                self.extractor.layout().fingerprint()
            )));
        }
        Ok(())
    }

    /// Current artifact, loading it on first use
    ///
    /// # Errors
    /// The load error, replayed on every call after a failed load.
    pub fn artifact(&self) -> Result<Arc<ModelArtifact>> {
        if let Some(result) = Self::resolve(self.read_state()) {
            return result;
        }

        let _guard = self
            .load_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another caller may have finished loading while we waited
        if let Some(result) = Self::resolve(self.read_state()) {
            return result;
        }
        self.load_and_publish()
    }

    /// Re-read storage and publish the result, clearing any cached failure
    ///
    /// # Errors
    /// The load error. An artifact already being served stays in place.
    pub fn reload(&self) -> Result<Arc<ModelArtifact>> {
        let _guard = self
            .load_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        info!(model_path = %self.paths.model_path.display(), "Reloading model artifact");
        self.load_and_publish()
    }

    /// Atomically replace the served artifact, returning the previous one
    ///
    /// # Errors
    /// `DetectError::Configuration` if `artifact` was trained on a different
    /// feature layout; the served artifact is left untouched.
    pub fn swap(&self, artifact: ModelArtifact) -> Result<Option<Arc<ModelArtifact>>> {
        self.check_layout(&artifact)?;
        let _guard = self
            .load_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = self.publish(HandleState::Loaded(Arc::new(artifact)));
        info!("Model artifact swapped");
        Ok(match previous {
            HandleState::Loaded(old) => Some(old),
            _ => None,
        })
    }

    /// Classify raw audio bytes of the declared format
    pub fn classify(&self, bytes: &[u8], format: AudioFormat) -> Result<ClassificationResult> {
        // Fail fast on model state before paying for decoding
        let artifact = self.artifact()?;
        let features = self.extractor.extract_bytes(bytes, format)?;
        self.classify_with(&artifact, &features)
    }

    /// Classify an already-extracted feature map
    pub fn classify_features(&self, features: &FeatureMap) -> Result<ClassificationResult> {
        let artifact = self.artifact()?;
        self.classify_with(&artifact, features)
    }

    fn classify_with(
        &self,
        artifact: &ModelArtifact,
        features: &FeatureMap,
    ) -> Result<ClassificationResult> {
        let vector = features.to_vector(artifact.layout())?;
        let normalized = artifact.normalizer().transform(vector.as_slice())?;
        let (label, confidence) = artifact.classifier().predict_with_confidence(&normalized)?;

        debug!(
            classification = %label,
            confidence = confidence,
            "Classification complete"
        );

        Ok(ClassificationResult {
            classification: label,
            confidence_score: confidence,
            explanation: self.explainer.explain(features, label, confidence),
        })
    }
}
