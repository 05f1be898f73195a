//! picsong-gen library interface
//!
//! Exposes the router and application state for integration testing.

pub mod api;
pub mod error;
pub mod generation;
pub mod services;
pub mod upload;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use picsong_common::storage::{StorageLayout, OUTPUTS_DIR, PROMPTS_DIR, UPLOADS_DIR};
use services::{MusicAnalyzer, MusicSynthesizer};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Where uploads, audio and prompt files live
    pub storage: StorageLayout,
    /// Image to music description
    pub analyzer: Arc<dyn MusicAnalyzer>,
    /// Music description to audio
    pub synthesizer: Arc<dyn MusicSynthesizer>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        storage: StorageLayout,
        analyzer: Arc<dyn MusicAnalyzer>,
        synthesizer: Arc<dyn MusicSynthesizer>,
    ) -> Self {
        Self {
            storage,
            analyzer,
            synthesizer,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember a failed request for `/health`
    pub async fn record_error(&self, err: &ApiError) {
        *self.last_error.write().await = Some(err.to_string());
    }
}

/// Build application router
///
/// Stored files are served read-only under `/uploads`, `/outputs` and `/prompts`.
pub fn build_router(state: AppState) -> Router {
    let storage = state.storage.clone();

    Router::new()
        // UI
        .merge(api::ui_routes())
        // API routes
        .merge(api::file_routes())
        .merge(api::generate_routes())
        .merge(api::health_routes())
        // Stored files
        .nest_service(&format!("/{}", UPLOADS_DIR), ServeDir::new(storage.uploads_dir()))
        .nest_service(&format!("/{}", OUTPUTS_DIR), ServeDir::new(storage.outputs_dir()))
        .nest_service(&format!("/{}", PROMPTS_DIR), ServeDir::new(storage.prompts_dir()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
