//! Test Helper Utilities
//!
//! Shared utilities for testing picsong-gen

#![allow(dead_code)]

pub mod audio_generator;
pub mod mock_services;
pub mod requests;

// Re-export commonly used items
pub use audio_generator::generate_test_wav;
pub use mock_services::{MockAnalyzer, MockSynthesizer};
pub use requests::{body_json, get, multipart_request, MultipartPart, JPEG_BYTES, PNG_BYTES};

use picsong_common::StorageLayout;
use picsong_gen::AppState;
use std::sync::Arc;
use tempfile::TempDir;

/// App state over a fresh storage root
///
/// Returns (TempDir, AppState) - TempDir must be kept alive for duration of test
pub fn test_app_state(
    analyzer: Arc<MockAnalyzer>,
    synthesizer: Arc<MockSynthesizer>,
) -> (TempDir, AppState) {
    let temp_dir = TempDir::new().unwrap();
    let storage = StorageLayout::new(temp_dir.path());
    storage.ensure_directories().unwrap();

    (temp_dir, AppState::new(storage, analyzer, synthesizer))
}

/// Names of the files in a storage subdirectory
pub fn dir_entries(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
