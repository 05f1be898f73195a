//! External AI services
//!
//! The HTTP layer only sees the two traits below, so the cloud clients can be
//! replaced by in-process fakes in tests.

pub mod analysis_client;
pub mod synthesis_client;
pub mod token_source;

pub use analysis_client::{AnalysisError, GeminiAnalyzer};
pub use synthesis_client::{LyriaSynthesizer, SynthesisError};
pub use token_source::{
    token_source_from_config, ServiceAccountKey, ServiceAccountTokenSource, StaticToken, TokenError,
    TokenSource,
};

use async_trait::async_trait;

/// Turns an image into a text description of matching music
#[async_trait]
pub trait MusicAnalyzer: Send + Sync {
    async fn analyze(&self, image: &[u8], mime_type: &str) -> Result<String, AnalysisError>;
}

/// Turns a text prompt into encoded audio
#[async_trait]
pub trait MusicSynthesizer: Send + Sync {
    async fn synthesize(&self, prompt: &str) -> Result<Vec<u8>, SynthesisError>;
}
