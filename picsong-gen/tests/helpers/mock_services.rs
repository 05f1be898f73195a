//! In-process stand-ins for the cloud AI services

use async_trait::async_trait;
use picsong_gen::services::{AnalysisError, MusicAnalyzer, MusicSynthesizer, SynthesisError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Analyzer returning a fixed description, or failing every call
pub struct MockAnalyzer {
    reply: Option<String>,
    calls: AtomicUsize,
    last_mime_type: Mutex<Option<String>>,
}

impl MockAnalyzer {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(text.to_string()),
            calls: AtomicUsize::new(0),
            last_mime_type: Mutex::new(None),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
            last_mime_type: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_mime_type(&self) -> Option<String> {
        self.last_mime_type.lock().unwrap().clone()
    }
}

#[async_trait]
impl MusicAnalyzer for MockAnalyzer {
    async fn analyze(&self, _image: &[u8], mime_type: &str) -> Result<String, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_mime_type.lock().unwrap() = Some(mime_type.to_string());

        self.reply.clone().ok_or(AnalysisError::NoCandidates)
    }
}

/// Synthesizer returning fixed audio, or failing every call
pub struct MockSynthesizer {
    audio: Option<Vec<u8>>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl MockSynthesizer {
    pub fn returning(audio: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            audio: Some(audio),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            audio: None,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl MusicSynthesizer for MockSynthesizer {
    async fn synthesize(&self, prompt: &str) -> Result<Vec<u8>, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());

        self.audio.clone().ok_or(SynthesisError::EmptyAudio)
    }
}
