//! POST /api/generate
//!
//! Accepts a multipart upload with an `image` file part, generates music for
//! it and returns the URLs of the stored image and audio.

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};

use crate::error::{ApiError, ApiResult};
use crate::generation::{self, GenerateResponse, GenerationOutcome};
use crate::upload::{ImageUpload, RawUpload, IMAGE_FIELD, MAX_UPLOAD_BYTES};
use crate::AppState;

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// First file part named `image`, if any
async fn read_image_part(mut multipart: Multipart) -> ApiResult<Option<RawUpload>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        // A plain form value named `image` is not a file
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;

        return Ok(Some(RawUpload {
            file_name,
            content_type,
            data,
        }));
    }

    Ok(None)
}

async fn run_generation(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<GenerationOutcome> {
    // Not multipart at all: there is no file to speak of
    let multipart = multipart.map_err(|_| ApiError::MissingImage)?;
    let raw = read_image_part(multipart).await?.ok_or(ApiError::MissingImage)?;

    // Everything is checked before any external call is made
    let image = ImageUpload::validate(raw)?;

    generation::generate(state, image).await
}

/// POST /api/generate
pub async fn generate_music(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<GenerateResponse>> {
    match run_generation(&state, multipart).await {
        Ok(outcome) => {
            tracing::info!(logical_name = %outcome.logical_name, "Generation complete");
            Ok(Json(outcome.into()))
        }
        Err(err) => {
            match &err {
                ApiError::MissingImage | ApiError::Validation(_) => {
                    tracing::warn!(error = %err, "Upload rejected")
                }
                _ => tracing::error!(error = %err, "Generation failed"),
            }
            state.record_error(&err).await;
            Err(err)
        }
    }
}

pub fn generate_routes() -> Router<AppState> {
    Router::new().route(
        "/api/generate",
        post(generate_music).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD)),
    )
}
