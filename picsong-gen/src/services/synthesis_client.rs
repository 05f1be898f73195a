//! Music synthesis client
//!
//! Sends the prompt to the Lyria model's `predict` endpoint and decodes the
//! base64 WAV it returns. One attempt per request; any failure is surfaced.

use super::analysis_client::model_url;
use super::token_source::TokenSource;
use super::MusicSynthesizer;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use picsong_common::config::AppConfig;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Synthesis client errors
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Response contained no audio")]
    EmptyAudio,

    #[error("Audio payload is not valid base64: {0}")]
    DecodeError(String),
}

#[derive(Debug, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
pub struct Prediction {
    #[serde(default, rename = "bytesBase64Encoded")]
    pub bytes_base64_encoded: Option<String>,
    #[serde(default, rename = "audioContent")]
    pub audio_content: Option<String>,
}

impl PredictResponse {
    /// Decoded audio of the first prediction
    pub fn into_audio(self) -> Result<Vec<u8>, SynthesisError> {
        let prediction = self.predictions.into_iter().next().ok_or(SynthesisError::EmptyAudio)?;
        let encoded = prediction
            .bytes_base64_encoded
            .or(prediction.audio_content)
            .filter(|s| !s.is_empty())
            .ok_or(SynthesisError::EmptyAudio)?;

        let audio = general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| SynthesisError::DecodeError(e.to_string()))?;

        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }
        Ok(audio)
    }
}

/// Vertex AI Lyria music synthesizer
pub struct LyriaSynthesizer {
    http_client: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    url: String,
    model: String,
}

impl LyriaSynthesizer {
    pub fn new(config: &AppConfig, tokens: Arc<dyn TokenSource>) -> Result<Self, SynthesisError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SynthesisError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            tokens,
            url: model_url(config, &config.synthesis_model, "predict"),
            model: config.synthesis_model.clone(),
        })
    }
}

#[async_trait]
impl MusicSynthesizer for LyriaSynthesizer {
    async fn synthesize(&self, prompt: &str) -> Result<Vec<u8>, SynthesisError> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| SynthesisError::AuthError(e.to_string()))?;

        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {}
        });

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "Requesting music synthesis");

        let response = self
            .http_client
            .post(&self.url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthesisError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SynthesisError::ApiError(status.as_u16(), error_text));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::ParseError(e.to_string()))?;

        let audio = parsed.into_audio()?;
        tracing::info!(model = %self.model, bytes = audio.len(), "Music synthesis complete");
        Ok(audio)
    }
}
