//! Image analysis client
//!
//! Sends the uploaded image to a multimodal Gemini model on Vertex AI and
//! returns the music description it writes. The description becomes the
//! prompt for the synthesis model.
//!
//! Endpoint: `{api}/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent`

use super::token_source::TokenSource;
use super::MusicAnalyzer;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use picsong_common::config::AppConfig;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Instruction sent alongside the image
pub const ANALYSIS_INSTRUCTION: &str = "Look at this image and write a prompt for a music \
generation model describing the instrumental track that would accompany it. Mention genre, \
mood, instrumentation and tempo. Reply with the prompt only, in at most 60 words.";

/// Analysis client errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Model returned no candidates")]
    NoCandidates,

    #[error("Model returned no content parts")]
    NoContent,

    #[error("Model returned an empty description")]
    EmptyText,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
pub struct ContentPart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Description text of the first candidate
    ///
    /// Text parts are concatenated and trimmed.
    pub fn into_text(self) -> Result<String, AnalysisError> {
        let candidate = self.candidates.into_iter().next().ok_or(AnalysisError::NoCandidates)?;
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        if parts.is_empty() {
            return Err(AnalysisError::NoContent);
        }

        let text: String = parts.into_iter().filter_map(|p| p.text).collect();
        let text = text.trim();
        if text.is_empty() {
            return Err(AnalysisError::EmptyText);
        }

        Ok(text.to_string())
    }
}

/// Vertex AI Gemini image analyzer
pub struct GeminiAnalyzer {
    http_client: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    url: String,
    model: String,
}

impl GeminiAnalyzer {
    pub fn new(config: &AppConfig, tokens: Arc<dyn TokenSource>) -> Result<Self, AnalysisError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AnalysisError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            tokens,
            url: model_url(config, &config.analysis_model, "generateContent"),
            model: config.analysis_model.clone(),
        })
    }
}

/// Publisher model URL for an action (`generateContent`, `predict`)
pub(crate) fn model_url(config: &AppConfig, model: &str, action: &str) -> String {
    format!(
        "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:{}",
        config.api_endpoint, config.project_id, config.location, model, action
    )
}

#[async_trait]
impl MusicAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, image: &[u8], mime_type: &str) -> Result<String, AnalysisError> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| AnalysisError::AuthError(e.to_string()))?;

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": mime_type,
                            "data": general_purpose::STANDARD.encode(image),
                        }
                    },
                    { "text": ANALYSIS_INSTRUCTION }
                ]
            }]
        });

        tracing::debug!(model = %self.model, bytes = image.len(), mime_type, "Requesting image analysis");

        let response = self
            .http_client
            .post(&self.url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AnalysisError::ApiError(status.as_u16(), error_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ParseError(e.to_string()))?;

        let text = parsed.into_text()?;
        tracing::info!(model = %self.model, chars = text.len(), "Image analysis complete");
        Ok(text)
    }
}
