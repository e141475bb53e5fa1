//! Offline training pipeline
//!
//! **Stages:**
//! 1. Extract features for every manifest entry (parallel, results kept in
//!    manifest order; unreadable or undecodable files are skipped)
//! 2. Stratified train/validation split with the seeded RNG
//! 3. Fit the normalizer on the training split only
//! 4. Fit the forest on the normalized training split
//! 5. Evaluate on the validation split and rank feature importances
//!
//! Given the same manifest, bytes and seed, two runs produce identical
//! metrics and identical serialized artifacts.

use super::manifest::{FsSampleReader, Manifest, ManifestEntry, SampleReader};
use super::metrics::EvaluationReport;
use crate::error::{DetectError, Result};
use crate::features::{ExtractorConfig, FeatureExtractor};
use crate::model::{ForestConfig, ModelArtifact, Normalizer, RandomForest};
use crate::types::Label;
use bvx_common::ArtifactPaths;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Below this many usable samples training proceeds with a warning
pub const MIN_RECOMMENDED_SAMPLES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of each class held out for validation
    pub test_size: f64,
    /// Features listed in the report, by importance
    pub top_features: usize,
    pub forest: ForestConfig,
    pub extractor: ExtractorConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            top_features: 10,
            forest: ForestConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

/// A manifest entry left out of training
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSample {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Usable samples per class, in [`Label`] index order
    pub class_counts: [usize; Label::COUNT],
    pub n_train: usize,
    pub n_validation: usize,
    pub skipped: Vec<SkippedSample>,
    pub evaluation: EvaluationReport,
    pub top_features: Vec<(String, f64)>,
    /// SHA-256 of the serialized artifact documents
    pub checksum: String,
}

/// Fitted artifact plus its report
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub report: TrainingReport,
}

pub struct TrainingPipeline<R: SampleReader = FsSampleReader> {
    config: TrainingConfig,
    extractor: FeatureExtractor,
    reader: R,
}

impl TrainingPipeline<FsSampleReader> {
    /// Pipeline reading samples from the filesystem
    pub fn new(config: TrainingConfig) -> Self {
        Self::with_reader(config, FsSampleReader)
    }
}

impl<R: SampleReader> TrainingPipeline<R> {
    pub fn with_reader(config: TrainingConfig, reader: R) -> Self {
        let extractor = FeatureExtractor::new(config.extractor.clone());
        Self {
            config,
            extractor,
            reader,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    fn extract_one(&self, entry: &ManifestEntry) -> std::result::Result<Vec<f64>, String> {
        let format = entry
            .format()
            .ok_or_else(|| "unsupported file extension".to_string())?;
        let bytes = self
            .reader
            .read(&entry.path)
            .map_err(|e| format!("read failed: {}", e))?;
        let features = self
            .extractor
            .extract_bytes(&bytes, format)
            .map_err(|e| e.to_string())?;
        features
            .to_vector(self.extractor.layout())
            .map(|v| v.into_inner())
            .map_err(|e| e.to_string())
    }

    /// Feature rows and labels for every usable entry, in manifest order
    pub fn extract_corpus(
        &self,
        manifest: &Manifest,
    ) -> (Vec<Vec<f64>>, Vec<Label>, Vec<SkippedSample>) {
        info!(files = manifest.len(), "Extracting features from training corpus");

        let results: Vec<std::result::Result<Vec<f64>, String>> = manifest
            .entries()
            .par_iter()
            .map(|entry| self.extract_one(entry))
            .collect();

        let mut x = Vec::with_capacity(results.len());
        let mut y = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();

        for (entry, result) in manifest.entries().iter().zip(results) {
            match result {
                Ok(row) => {
                    x.push(row);
                    y.push(entry.label);
                }
                Err(reason) => {
                    warn!(path = %entry.path.display(), "Skipping training sample: {}", reason);
                    skipped.push(SkippedSample {
                        path: entry.path.clone(),
                        reason,
                    });
                }
            }
        }

        (x, y, skipped)
    }

    /// Train from a corpus manifest
    pub fn run(&self, manifest: &Manifest) -> Result<TrainingOutcome> {
        let (x, y, skipped) = self.extract_corpus(manifest);
        let mut outcome = self.fit_matrix(&x, &y)?;
        outcome.report.skipped = skipped;
        Ok(outcome)
    }

    /// Train from a manifest and persist the artifact
    pub fn run_and_save(&self, manifest: &Manifest, paths: &ArtifactPaths) -> Result<TrainingOutcome> {
        let outcome = self.run(manifest)?;
        outcome.artifact.save(paths)?;
        Ok(outcome)
    }

    /// Train from an assembled design matrix
    ///
    /// # Errors
    /// - `Configuration`: row width differs from the extractor layout
    /// - `Training`: fewer than 2 rows, a class with no rows, or a
    ///   row/label count mismatch
    pub fn fit_matrix(&self, x: &[Vec<f64>], y: &[Label]) -> Result<TrainingOutcome> {
        let layout = self.extractor.layout().clone();

        if x.len() != y.len() {
            return Err(DetectError::Training(format!(
                "{} feature rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        if let Some(row) = x.iter().find(|r| r.len() != layout.len()) {
            return Err(DetectError::Configuration(format!(
                "Feature row has {} values, layout expects {}",
                row.len(),
                layout.len()
            )));
        }

        let mut class_counts = [0usize; Label::COUNT];
        for label in y {
            class_counts[label.index()] += 1;
        }
        if x.len() < 2 {
            return Err(DetectError::Training(format!(
                "Need at least 2 usable samples, have {}",
                x.len()
            )));
        }
        if let Some(label) = Label::ALL.iter().find(|l| class_counts[l.index()] == 0) {
            return Err(DetectError::Training(format!("No usable {} samples", label)));
        }
        if x.len() < MIN_RECOMMENDED_SAMPLES {
            warn!(
                samples = x.len(),
                "Very few training samples; the model will not generalize"
            );
        }

        info!(
            ai_samples = class_counts[Label::AiGenerated.index()],
            human_samples = class_counts[Label::Human.index()],
            features = layout.len(),
            "Training data assembled"
        );

        let (train_idx, val_idx) = stratified_split(y, self.config.test_size, self.config.forest.seed);
        let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
        let y_train: Vec<Label> = train_idx.iter().map(|&i| y[i]).collect();
        let x_val: Vec<Vec<f64>> = val_idx.iter().map(|&i| x[i].clone()).collect();
        let y_val: Vec<Label> = val_idx.iter().map(|&i| y[i]).collect();

        let normalizer = Normalizer::fit(&x_train)?;
        let x_train = normalizer.transform_matrix(&x_train)?;
        let x_val = normalizer.transform_matrix(&x_val)?;

        let classifier = RandomForest::fit(&x_train, &y_train, self.config.forest.clone())?;

        let (eval_x, eval_y) = if x_val.is_empty() {
            warn!("Validation split is empty; reporting training-set metrics");
            (&x_train, &y_train)
        } else {
            (&x_val, &y_val)
        };
        let predicted = eval_x
            .iter()
            .map(|row| classifier.predict(row))
            .collect::<Result<Vec<Label>>>()?;
        let evaluation = EvaluationReport::compute(eval_y, &predicted);

        info!(
            accuracy = evaluation.accuracy,
            train = x_train.len(),
            validation = x_val.len(),
            "Model evaluated"
        );

        let top_features = classifier.ranked_importances(&layout, self.config.top_features);
        let artifact = ModelArtifact::new(layout, normalizer, classifier)?;
        let checksum = artifact.checksum()?;

        Ok(TrainingOutcome {
            report: TrainingReport {
                class_counts,
                n_train: train_idx.len(),
                n_validation: val_idx.len(),
                skipped: Vec::new(),
                evaluation,
                top_features,
                checksum,
            },
            artifact,
        })
    }
}

/// Per-class shuffled split into (train, validation) row indices, each sorted
///
/// A class with at least 2 rows keeps at least one row on each side.
pub fn stratified_split(y: &[Label], test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut validation = Vec::new();

    for label in Label::ALL {
        let mut idx: Vec<usize> = (0..y.len()).filter(|&i| y[i] == label).collect();
        idx.shuffle(&mut rng);

        let n = idx.len();
        let n_val = if n >= 2 {
            ((n as f64 * test_size).round() as usize).clamp(1, n - 1)
        } else {
            0
        };
        validation.extend_from_slice(&idx[..n_val]);
        train.extend_from_slice(&idx[n_val..]);
    }

    train.sort_unstable();
    validation.sort_unstable();
    (train, validation)
}
