//! Storage layout
//!
//! Three sibling directories under one storage root, each served over HTTP
//! under its own URL prefix:
//! - `uploads/` - uploaded images (`<stem>-<unix-millis>.<ext>`)
//! - `outputs/` - generated audio (`<logical name>.wav`)
//! - `prompts/` - generated prompt text (`<logical name>.txt`)

use crate::Result;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::{Path, PathBuf};
use tracing::info;

pub const UPLOADS_DIR: &str = "uploads";
pub const OUTPUTS_DIR: &str = "outputs";
pub const PROMPTS_DIR: &str = "prompts";

/// Characters escaped in a URL path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Extension used for generated audio
pub const AUDIO_EXTENSION: &str = "wav";

/// Extension used for generated prompt text
pub const PROMPT_EXTENSION: &str = "txt";

/// Locations of the persisted images, audio and prompt text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.root.join(OUTPUTS_DIR)
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.root.join(PROMPTS_DIR)
    }

    /// Create all three directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.uploads_dir(), self.outputs_dir(), self.prompts_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
                info!("Created storage directory: {}", dir.display());
            }
        }
        Ok(())
    }

    /// Filename of the generated audio for a logical name
    pub fn audio_filename(logical_name: &str) -> String {
        format!("{}.{}", logical_name, AUDIO_EXTENSION)
    }

    /// Filename of the prompt text for a logical name
    pub fn prompt_filename(logical_name: &str) -> String {
        format!("{}.{}", logical_name, PROMPT_EXTENSION)
    }

    pub fn audio_path(&self, logical_name: &str) -> PathBuf {
        self.outputs_dir().join(Self::audio_filename(logical_name))
    }

    pub fn prompt_path(&self, logical_name: &str) -> PathBuf {
        self.prompts_dir().join(Self::prompt_filename(logical_name))
    }

    pub fn image_url(filename: &str) -> String {
        file_url(UPLOADS_DIR, filename)
    }

    pub fn audio_url(filename: &str) -> String {
        file_url(OUTPUTS_DIR, filename)
    }
}

/// `/<prefix>/<filename>` with the filename percent-encoded as one path segment
fn file_url(prefix: &str, filename: &str) -> String {
    format!("/{}/{}", prefix, utf8_percent_encode(filename, PATH_SEGMENT))
}
