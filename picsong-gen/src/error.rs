//! Error types for picsong-gen
//!
//! Every handler error becomes a JSON body `{ "error": ..., "details": ... }`:
//! - a request without an image file is the caller's to fix (400)
//! - everything else, a rejected upload included, is surfaced as 500

use crate::services::{AnalysisError, SynthesisError};
use crate::upload::UploadError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// No `image` file part in the request (400)
    #[error("No image file provided")]
    MissingImage,

    /// Upload rejected before any external call (500)
    #[error("Invalid upload: {0}")]
    Validation(String),

    /// Analysis or synthesis service failed (500)
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// picsong-common error
    #[error("Common error: {0}")]
    Common(#[from] picsong_common::Error),
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        ApiError::Upstream(format!("Image analysis failed: {}", err))
    }
}

impl From<SynthesisError> for ApiError {
    fn from(err: SynthesisError) -> Self {
        ApiError::Upstream(format!("Music synthesis failed: {}", err))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingImage => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short summary for the `error` field
    fn summary(&self) -> &'static str {
        match self {
            ApiError::MissingImage => "No image file provided",
            ApiError::Validation(_) => "Invalid image upload",
            ApiError::Upstream(_) => "Failed to generate music",
            ApiError::Io(_) => "File system error",
            ApiError::Internal(_) | ApiError::Common(_) => "Internal server error",
        }
    }

    /// Stringified cause for the `details` field
    fn details(&self) -> Option<String> {
        match self {
            ApiError::MissingImage => None,
            ApiError::Validation(msg) | ApiError::Upstream(msg) | ApiError::Internal(msg) => Some(msg.clone()),
            ApiError::Io(err) => Some(err.to_string()),
            ApiError::Common(err) => Some(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self.details() {
            Some(details) => json!({ "error": self.summary(), "details": details }),
            None => json!({ "error": self.summary() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
