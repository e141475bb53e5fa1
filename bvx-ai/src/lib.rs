//! bvx-ai library interface
//!
//! Classifies short speech recordings as AI-generated or human. The hosting
//! layer hands raw bytes and a declared format to [`InferenceEngine`] and
//! receives a [`ClassificationResult`]; [`training::TrainingPipeline`]
//! produces the artifacts the engine serves.

pub mod audio;
pub mod engine;
pub mod error;
pub mod explain;
pub mod features;
pub mod model;
pub mod synthetic;
pub mod training;
pub mod types;

pub use crate::engine::InferenceEngine;
pub use crate::error::{DetectError, Fault, Result};
pub use crate::explain::{ExplanationGenerator, ExplanationThresholds};
pub use crate::features::{
    ExtractorConfig, FeatureExtractor, FeatureLayout, FeatureMap, FeatureVector, FEATURE_COUNT,
};
pub use crate::model::{ForestConfig, ModelArtifact, Normalizer, RandomForest};
pub use crate::types::{AudioFormat, ClassificationResult, Label};
pub use bvx_common::ArtifactPaths;
