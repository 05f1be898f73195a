//! # picsong common library
//!
//! Shared code for the picsong service:
//! - Error type
//! - Configuration loading and resolution
//! - Storage layout of the persisted images, audio and prompts
//! - Reconciliation of those directories into browsable records

pub mod config;
pub mod error;
pub mod library;
pub mod storage;

pub use error::{Error, Result};
pub use library::{collect_records, MatchedRecord};
pub use storage::StorageLayout;
