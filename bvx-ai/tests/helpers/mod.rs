//! Test Helper Utilities
//!
//! Shared fixtures for bvx-ai integration tests

#![allow(dead_code, unused_imports)]

pub mod audio_generator;
pub mod log_capture;

pub use audio_generator::{write_fixture, Signal, WavFixture};
pub use log_capture::LogCapture;
