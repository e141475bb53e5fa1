//! Integration tests for the training pipeline on encoded corpora

mod helpers;

use bvx_ai::training::{Manifest, ManifestEntry, SampleReader, TrainingConfig, TrainingPipeline};
use bvx_ai::{ArtifactPaths, DetectError, ForestConfig, InferenceEngine, Label, ModelArtifact};
use helpers::{write_fixture, LogCapture, Signal, WavFixture};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PER_CLASS: usize = 6;

fn quick_config() -> TrainingConfig {
    TrainingConfig {
        forest: ForestConfig {
            n_trees: 15,
            ..ForestConfig::default()
        },
        ..TrainingConfig::default()
    }
}

fn human_fixture(i: usize) -> WavFixture {
    WavFixture::new(Signal::Vibrato(150.0 + 20.0 * i as f64, 30.0, 3.0 + i as f64)).seconds(0.6)
}

fn ai_fixture(i: usize) -> WavFixture {
    WavFixture::new(Signal::Sine(160.0 + 25.0 * i as f64)).seconds(0.6)
}

/// human/ and ai/ corpora plus one corrupt file in human/
fn build_corpus(root: &Path) -> (PathBuf, PathBuf) {
    let human = root.join("human");
    let ai = root.join("ai");
    for i in 0..PER_CLASS {
        write_fixture(&human.join(format!("h{:02}.wav", i)), &human_fixture(i)).unwrap();
        write_fixture(&ai.join(format!("a{:02}.wav", i)), &ai_fixture(i)).unwrap();
    }
    std::fs::write(human.join("broken.wav"), b"RIFF....WAVEjunkjunkjunk").unwrap();
    (human, ai)
}

#[test]
fn test_corpus_training_skips_corrupt_file() {
    let root = TempDir::new().unwrap();
    let (human, ai) = build_corpus(root.path());
    let manifest = Manifest::from_dirs(&human, &ai).unwrap();
    assert_eq!(manifest.len(), 2 * PER_CLASS + 1);

    let capture = LogCapture::new();
    let outcome = capture
        .scoped(|| TrainingPipeline::new(quick_config()).run(&manifest))
        .unwrap();
    let report = &outcome.report;

    assert_eq!(report.class_counts, [PER_CLASS, PER_CLASS]);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].path.ends_with("broken.wav"));
    assert_eq!(report.n_train + report.n_validation, 2 * PER_CLASS);
    assert!(report.n_validation >= 2);
    assert_eq!(report.top_features.len(), 10);

    capture.assert_warned("Skipping training sample");
    // 12 usable samples clears the small-corpus floor
    assert!(capture.matching(tracing::Level::WARN, "Very few training samples").is_empty());
}

#[test]
fn test_corpus_training_is_reproducible() {
    let root = TempDir::new().unwrap();
    let (human, ai) = build_corpus(root.path());
    let manifest = Manifest::from_dirs(&human, &ai).unwrap();
    let pipeline = TrainingPipeline::new(quick_config());

    let a = pipeline.run(&manifest).unwrap();
    let b = pipeline.run(&manifest).unwrap();

    assert_eq!(a.report, b.report);
    assert_eq!(a.report.checksum, b.report.checksum);
    assert_eq!(a.artifact.to_documents().unwrap(), b.artifact.to_documents().unwrap());
}

#[test]
fn test_saved_artifact_loads_and_serves() {
    let root = TempDir::new().unwrap();
    let (human, ai) = build_corpus(root.path());
    let manifest = Manifest::from_dirs(&human, &ai).unwrap();
    let paths = ArtifactPaths::in_dir(root.path().join("artifacts"));

    let outcome = TrainingPipeline::new(quick_config())
        .run_and_save(&manifest, &paths)
        .unwrap();

    let loaded = ModelArtifact::load(&paths).unwrap();
    assert_eq!(loaded, outcome.artifact);
    assert_eq!(loaded.checksum().unwrap(), outcome.report.checksum);

    let engine = InferenceEngine::new(paths);
    let bytes = human_fixture(1).to_bytes().unwrap();
    let result = engine.classify(&bytes, bvx_ai::AudioFormat::Wav).unwrap();
    assert!((0.5..=1.0).contains(&result.confidence_score));
}

#[test]
fn test_all_files_corrupt_is_training_error() {
    let root = TempDir::new().unwrap();
    let human = root.path().join("human");
    let ai = root.path().join("ai");
    std::fs::create_dir_all(&human).unwrap();
    std::fs::create_dir_all(&ai).unwrap();
    std::fs::write(human.join("x.wav"), b"nope").unwrap();
    std::fs::write(ai.join("y.wav"), b"nope").unwrap();

    let manifest = Manifest::from_dirs(&human, &ai).unwrap();
    let err = TrainingPipeline::new(quick_config()).run(&manifest).unwrap_err();
    assert!(matches!(err, DetectError::Training(_)));
}

/// Serves fixture bytes from memory
struct MemoryReader(HashMap<PathBuf, Vec<u8>>);

impl SampleReader for MemoryReader {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        self.0
            .get(path)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "not in memory"))
    }
}

#[test]
fn test_pipeline_runs_on_in_memory_reader() {
    let mut files = HashMap::new();
    let mut entries = Vec::new();
    for i in 0..PER_CLASS {
        let h = PathBuf::from(format!("mem/human/{}.wav", i));
        let a = PathBuf::from(format!("mem/ai/{}.wav", i));
        files.insert(h.clone(), human_fixture(i).to_bytes().unwrap());
        files.insert(a.clone(), ai_fixture(i).to_bytes().unwrap());
        entries.push(ManifestEntry::new(h, Label::Human));
        entries.push(ManifestEntry::new(a, Label::AiGenerated));
    }
    entries.push(ManifestEntry::new("mem/ai/missing.wav", Label::AiGenerated));
    entries.push(ManifestEntry::new("mem/human/readme.txt", Label::Human));

    let pipeline = TrainingPipeline::with_reader(quick_config(), MemoryReader(files));
    let outcome = pipeline.run(&Manifest::new(entries)).unwrap();

    assert_eq!(outcome.report.class_counts, [PER_CLASS, PER_CLASS]);
    let reasons: Vec<&str> = outcome.report.skipped.iter().map(|s| s.reason.as_str()).collect();
    assert_eq!(reasons.len(), 2);
    assert!(reasons.iter().any(|r| r.contains("read failed")));
    assert!(reasons.iter().any(|r| r.contains("unsupported file extension")));
}
