//! Labeled corpus manifest
//!
//! The training pipeline never walks directories itself; it consumes a
//! [`Manifest`], a sorted list of (path, label) pairs. Directory scanning
//! lives here, and file reading goes through [`SampleReader`] so tests can
//! run the pipeline on in-memory bytes.

use crate::error::{DetectError, Result};
use crate::types::{AudioFormat, Label};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// One labeled recording
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub label: Label,
}

impl ManifestEntry {
    pub fn new(path: impl Into<PathBuf>, label: Label) -> Self {
        Self {
            path: path.into(),
            label,
        }
    }

    /// Container format implied by the file extension
    pub fn format(&self) -> Option<AudioFormat> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(AudioFormat::from_extension)
    }
}

/// Sorted, de-duplicated training corpus
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Normalize `entries` into path order
    pub fn new(mut entries: Vec<ManifestEntry>) -> Self {
        entries.sort();
        entries.dedup();
        Self { entries }
    }

    /// Scan a human corpus and an AI corpus recursively
    ///
    /// # Errors
    /// `DetectError::Training` if either root is missing or not a directory.
    pub fn from_dirs(human_dir: &Path, ai_dir: &Path) -> Result<Self> {
        let mut entries = scan_dir(human_dir, Label::Human)?;
        entries.extend(scan_dir(ai_dir, Label::AiGenerated)?);
        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries carrying `label`
    pub fn count(&self, label: Label) -> usize {
        self.entries.iter().filter(|e| e.label == label).count()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Audio files under `root` (by extension, case-insensitive), unsorted
fn scan_dir(root: &Path, label: Label) -> Result<Vec<ManifestEntry>> {
    if !root.exists() {
        return Err(DetectError::Training(format!(
            "Corpus path not found: {}",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(DetectError::Training(format!(
            "Corpus path is not a directory: {}",
            root.display()
        )));
    }

    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let is_audio = entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(AudioFormat::from_extension)
                    .is_some();
                if is_audio {
                    entries.push(ManifestEntry::new(entry.into_path(), label));
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Error accessing corpus entry: {}", e),
        }
    }

    debug!(
        root = %root.display(),
        label = %label,
        files = entries.len(),
        "Corpus directory scanned"
    );
    Ok(entries)
}

/// Source of raw sample bytes
pub trait SampleReader: Sync {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// Reads samples from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSampleReader;

impl SampleReader for FsSampleReader {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_new_sorts_and_dedups() {
        let manifest = Manifest::new(vec![
            ManifestEntry::new("b.wav", Label::Human),
            ManifestEntry::new("a.wav", Label::AiGenerated),
            ManifestEntry::new("b.wav", Label::Human),
        ]);
        let paths: Vec<&Path> = manifest.entries().iter().map(|e| e.path.as_path()).collect();
        assert_eq!(paths, vec![Path::new("a.wav"), Path::new("b.wav")]);
        assert_eq!(manifest.count(Label::Human), 1);
    }

    #[test]
    fn test_from_dirs_filters_and_labels() {
        let root = TempDir::new().unwrap();
        let human = root.path().join("human");
        let ai = root.path().join("ai");
        fs::create_dir_all(human.join("nested")).unwrap();
        fs::create_dir_all(&ai).unwrap();

        fs::write(human.join("z.wav"), b"x").unwrap();
        fs::write(human.join("nested").join("a.FLAC"), b"x").unwrap();
        fs::write(human.join("notes.txt"), b"x").unwrap();
        fs::write(human.join(".hidden.wav"), b"x").unwrap();
        fs::write(ai.join("clip.mp3"), b"x").unwrap();
        fs::write(ai.join("clip.ogg"), b"x").unwrap();

        let manifest = Manifest::from_dirs(&human, &ai).unwrap();
        assert_eq!(manifest.len(), 4);
        assert_eq!(manifest.count(Label::Human), 2);
        assert_eq!(manifest.count(Label::AiGenerated), 2);

        let sorted = manifest
            .entries()
            .windows(2)
            .all(|w| w[0].path <= w[1].path);
        assert!(sorted);
        assert_eq!(manifest.entries()[0].format(), Some(AudioFormat::Mp3));
    }

    #[test]
    fn test_missing_root_is_training_error() {
        let root = TempDir::new().unwrap();
        let result = Manifest::from_dirs(&root.path().join("nope"), root.path());
        assert!(matches!(result, Err(DetectError::Training(_))));
    }
}
