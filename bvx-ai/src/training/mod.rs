//! Offline training: corpus manifest, feature extraction, fitting and
//! evaluation

pub mod manifest;
pub mod metrics;
pub mod pipeline;

pub use manifest::{FsSampleReader, Manifest, ManifestEntry, SampleReader};
pub use metrics::{ClassMetrics, EvaluationReport};
pub use pipeline::{
    stratified_split, SkippedSample, TrainingConfig, TrainingOutcome, TrainingPipeline,
    TrainingReport,
};
