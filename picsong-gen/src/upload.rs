//! Image upload validation and naming
//!
//! An upload is accepted when:
//! - its extension is one of the image extensions
//! - its declared content type starts with `image/`
//! - content sniffing does not identify it as something other than an image
//! - it is non-empty and at most [`MAX_UPLOAD_BYTES`]
//!
//! Accepted uploads are stored as `<sanitized stem>-<unix millis>.<ext>`.

use axum::body::Bytes;
use picsong_common::library::{image_logical_name, FileScanner};
use std::path::Path;
use thiserror::Error;

/// Largest accepted image
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

const FALLBACK_STEM: &str = "image";

/// Reasons an upload is rejected
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unsupported file type '{0}', expected .jpg, .jpeg, .png, .gif or .webp")]
    UnsupportedExtension(String),

    #[error("Content type '{0}' is not an image")]
    NotAnImage(String),

    #[error("File content looks like {0}, not an image")]
    ContentMismatch(String),

    #[error("File is empty")]
    Empty,

    #[error("File is too large ({0} bytes, max {max})", max = MAX_UPLOAD_BYTES)]
    TooLarge(usize),
}

/// File part as received from the client
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Upload that passed validation
#[derive(Debug, Clone)]
pub struct ImageUpload {
    stem: String,
    /// Lowercase, with leading dot
    extension: String,
    mime_type: String,
    data: Bytes,
}

impl ImageUpload {
    pub fn validate(raw: RawUpload) -> Result<Self, UploadError> {
        // Some browsers send a full client path
        let base_name = raw
            .file_name
            .rsplit(&['/', '\\'][..])
            .next()
            .unwrap_or_default()
            .to_string();

        if !FileScanner::images().accepts(&base_name) {
            return Err(UploadError::UnsupportedExtension(base_name));
        }

        let declared = raw.content_type.unwrap_or_default();
        if !declared.to_ascii_lowercase().starts_with("image/") {
            return Err(UploadError::NotAnImage(declared));
        }

        if raw.data.is_empty() {
            return Err(UploadError::Empty);
        }
        if raw.data.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge(raw.data.len()));
        }

        // Sniffed type wins when recognised; unknown content falls back to the declared type
        let mime_type = match infer::get(&raw.data) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Image => kind.mime_type().to_string(),
            Some(kind) => return Err(UploadError::ContentMismatch(kind.mime_type().to_string())),
            None => declared,
        };

        let path = Path::new(&base_name);
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        let stem = sanitize_stem(&path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default());

        Ok(Self {
            stem,
            extension,
            mime_type,
            data: raw.data,
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Name on disk for an upload received at `timestamp_millis`
    pub fn stored_filename(&self, timestamp_millis: i64) -> String {
        format!("{}-{}{}", self.stem, timestamp_millis, self.extension)
    }

    /// Logical name the stored file resolves to
    pub fn logical_name(&self, timestamp_millis: i64) -> String {
        image_logical_name(&self.stored_filename(timestamp_millis))
    }
}

/// Keep `[A-Za-z0-9_-]`, replace everything else with `_`
pub fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    if cleaned.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        cleaned
    }
}
