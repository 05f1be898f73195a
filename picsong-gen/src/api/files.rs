//! GET /api/files
//!
//! Lists every image that has generated audio, newest image first.

use axum::{extract::State, routing::get, Json, Router};
use picsong_common::{collect_records, MatchedRecord};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/files response
#[derive(Debug, Serialize)]
pub struct FilesResponse {
    pub files: Vec<MatchedRecord>,
}

/// GET /api/files
///
/// Rescans the storage directories on every call.
pub async fn list_files(State(state): State<AppState>) -> ApiResult<Json<FilesResponse>> {
    let storage = state.storage.clone();

    let files = match tokio::task::spawn_blocking(move || collect_records(&storage)).await {
        Ok(files) => files,
        Err(e) => {
            let err = ApiError::Internal(format!("Failed to list files: {}", e));
            state.record_error(&err).await;
            return Err(err);
        }
    };

    tracing::debug!(count = files.len(), "Listing generated files");
    Ok(Json(FilesResponse { files }))
}

pub fn file_routes() -> Router<crate::AppState> {
    Router::new().route("/api/files", get(list_files))
}
