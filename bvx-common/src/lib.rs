//! # BVX Common Library
//!
//! Shared code for the BVX voice-authenticity crates including:
//! - Error types
//! - Bootstrap configuration loading (artifact locations, logging)
//! - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ArtifactPaths, BootstrapConfig, LoggingConfig};
pub use error::{Error, Result};
