//! Fitted model components and their persisted form

pub mod artifact;
pub mod forest;
pub mod normalizer;
pub mod tree;

pub use artifact::{ModelArtifact, ARTIFACT_FORMAT_VERSION};
pub use forest::{ForestConfig, RandomForest};
pub use normalizer::Normalizer;
