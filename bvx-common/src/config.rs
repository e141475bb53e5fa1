//! Bootstrap configuration loading and artifact path resolution
//!
//! Artifact locations follow this priority order:
//! 1. `MODEL_PATH` / `SCALER_PATH` environment variables (per file)
//! 2. `BVX_ARTIFACT_DIR` environment variable (directory holding both files)
//! 3. TOML config file (`model_path`, `scaler_path`, `artifact_dir`)
//! 4. Compiled default under `ml_engine/model_artifacts`

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the classifier artifact location
pub const MODEL_PATH_ENV: &str = "MODEL_PATH";
/// Environment variable overriding the normalizer artifact location
pub const SCALER_PATH_ENV: &str = "SCALER_PATH";
/// Environment variable naming a directory that holds both artifacts
pub const ARTIFACT_DIR_ENV: &str = "BVX_ARTIFACT_DIR";
/// Environment variable pointing at an explicit TOML config file
pub const CONFIG_FILE_ENV: &str = "BVX_CONFIG";

/// Default artifact directory, relative to the working directory
pub const DEFAULT_ARTIFACT_DIR: &str = "ml_engine/model_artifacts";
/// Default classifier file name inside the artifact directory
pub const DEFAULT_MODEL_FILE: &str = "voice_classifier.json";
/// Default normalizer file name inside the artifact directory
pub const DEFAULT_SCALER_FILE: &str = "scaler.json";

/// Bootstrap configuration loaded from TOML
///
/// Every field is optional; a missing file means "all defaults".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapConfig {
    /// Explicit classifier artifact path
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Explicit normalizer artifact path
    #[serde(default)]
    pub scaler_path: Option<PathBuf>,

    /// Directory holding both artifacts under their default names
    #[serde(default)]
    pub artifact_dir: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BootstrapConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Read and parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load the bootstrap config with graceful degradation
    ///
    /// A missing file yields defaults silently; an unreadable or invalid file
    /// yields defaults with a warning.
    pub fn load() -> Self {
        let Some(path) = locate_config_file() else {
            debug!("No BVX config file found, using defaults");
            return Self::default();
        };

        match Self::from_file(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded BVX config file");
                config
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Find the config file for this platform
///
/// `BVX_CONFIG` wins; otherwise the user config dir, then `/etc/bvx` on Linux.
fn locate_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        let path = PathBuf::from(path);
        return path.exists().then_some(path);
    }

    let user_config = dirs::config_dir().map(|d| d.join("bvx").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/bvx/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Filesystem locations of the two persisted artifact documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Classifier document
    pub model_path: PathBuf,
    /// Normalizer document
    pub scaler_path: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::in_dir(DEFAULT_ARTIFACT_DIR)
    }
}

impl ArtifactPaths {
    /// Both artifacts under their default file names inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model_path: dir.join(DEFAULT_MODEL_FILE),
            scaler_path: dir.join(DEFAULT_SCALER_FILE),
        }
    }

    /// Resolve artifact paths from environment, config file, then defaults
    pub fn resolve() -> Self {
        Self::resolve_with(&BootstrapConfig::load())
    }

    /// Resolve artifact paths against an already-loaded bootstrap config
    pub fn resolve_with(config: &BootstrapConfig) -> Self {
        let base = if let Ok(dir) = std::env::var(ARTIFACT_DIR_ENV) {
            Self::in_dir(dir)
        } else if let Some(dir) = &config.artifact_dir {
            Self::in_dir(dir)
        } else {
            Self::default()
        };

        let model_path = std::env::var(MODEL_PATH_ENV)
            .map(PathBuf::from)
            .ok()
            .or_else(|| env_dir_wins().then(|| base.model_path.clone()))
            .or_else(|| config.model_path.clone())
            .unwrap_or(base.model_path);

        let scaler_path = std::env::var(SCALER_PATH_ENV)
            .map(PathBuf::from)
            .ok()
            .or_else(|| env_dir_wins().then(|| base.scaler_path.clone()))
            .or_else(|| config.scaler_path.clone())
            .unwrap_or(base.scaler_path);

        Self {
            model_path,
            scaler_path,
        }
    }
}

/// `BVX_ARTIFACT_DIR` outranks per-file TOML entries
fn env_dir_wins() -> bool {
    std::env::var_os(ARTIFACT_DIR_ENV).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = BootstrapConfig::from_toml_str(
            r#"
            model_path = "/srv/bvx/model.json"
            scaler_path = "/srv/bvx/scaler.json"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.model_path, Some(PathBuf::from("/srv/bvx/model.json")));
        assert_eq!(config.scaler_path, Some(PathBuf::from("/srv/bvx/scaler.json")));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = BootstrapConfig::from_toml_str("").unwrap();
        assert!(config.model_path.is_none());
        assert!(config.artifact_dir.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = BootstrapConfig::from_toml_str("model_path = [1, 2");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_in_dir_uses_default_names() {
        let paths = ArtifactPaths::in_dir("/tmp/artifacts");
        assert_eq!(paths.model_path, PathBuf::from("/tmp/artifacts/voice_classifier.json"));
        assert_eq!(paths.scaler_path, PathBuf::from("/tmp/artifacts/scaler.json"));
    }
}
