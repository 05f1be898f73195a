//! Image-to-music generation
//!
//! Steps for one accepted upload:
//! 1. Ask the analyzer for a music description of the in-memory image
//! 2. Ask the synthesizer for audio
//! 3. Stage the image in `uploads/` under a name the scanner ignores
//! 4. Store the audio as `<logical name>.wav`
//! 5. Move the staged image to its timestamped name
//! 6. Store the description as `<logical name>.txt` (best effort)
//!
//! Nothing new is visible to the listing until the audio is on disk, so a
//! failed regeneration leaves the previous image, prompt and audio in place.

use crate::error::ApiResult;
use crate::upload::ImageUpload;
use crate::AppState;
use chrono::Utc;
use picsong_common::StorageLayout;
use serde::Serialize;
use tracing::{info, warn};

/// Files produced by one generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub logical_name: String,
    pub image_filename: String,
    pub audio_filename: String,
    pub prompt: String,
}

/// POST /api/generate success body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    pub image_url: String,
    pub prompt: String,
    pub audio_url: String,
    pub filename: String,
}

impl From<GenerationOutcome> for GenerateResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        Self {
            success: true,
            image_url: StorageLayout::image_url(&outcome.image_filename),
            prompt: outcome.prompt,
            audio_url: StorageLayout::audio_url(&outcome.audio_filename),
            filename: outcome.audio_filename,
        }
    }
}

/// Suffix of an image written but not yet published
const STAGING_SUFFIX: &str = ".part";

/// Run the full generation for a validated upload
pub async fn generate(state: &AppState, image: ImageUpload) -> ApiResult<GenerationOutcome> {
    let storage = &state.storage;
    // Recreated if removed while running
    storage.ensure_directories()?;

    let received_at = Utc::now().timestamp_millis();
    let image_filename = image.stored_filename(received_at);
    let logical_name = image.logical_name(received_at);
    info!(
        logical_name = %logical_name,
        bytes = image.data().len(),
        mime_type = image.mime_type(),
        "Generation started"
    );

    let prompt = state.analyzer.analyze(image.data(), image.mime_type()).await?;
    info!(logical_name = %logical_name, prompt = %prompt, "Music prompt generated");

    let audio = state.synthesizer.synthesize(&prompt).await?;

    let image_path = storage.uploads_dir().join(&image_filename);
    let staged_path = storage
        .uploads_dir()
        .join(format!(".{}{}", image_filename, STAGING_SUFFIX));
    tokio::fs::write(&staged_path, image.data()).await?;

    let audio_filename = StorageLayout::audio_filename(&logical_name);
    if let Err(e) = tokio::fs::write(storage.audio_path(&logical_name), &audio).await {
        discard_staged(&staged_path).await;
        return Err(e.into());
    }
    info!(
        logical_name = %logical_name,
        file = %audio_filename,
        bytes = audio.len(),
        "Audio stored"
    );

    if let Err(e) = tokio::fs::rename(&staged_path, &image_path).await {
        discard_staged(&staged_path).await;
        return Err(e.into());
    }
    info!(logical_name = %logical_name, file = %image_filename, "Image stored");

    let prompt_path = storage.prompt_path(&logical_name);
    if let Err(e) = tokio::fs::write(&prompt_path, &prompt).await {
        // A stale prompt would describe the previous audio
        warn!(path = %prompt_path.display(), error = %e, "Failed to store prompt text");
        if let Err(e) = tokio::fs::remove_file(&prompt_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %prompt_path.display(), error = %e, "Failed to remove stale prompt text");
            }
        }
    }

    Ok(GenerationOutcome {
        logical_name,
        image_filename,
        audio_filename,
        prompt,
    })
}

async fn discard_staged(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove staged image");
    }
}
