//! Directory scanner
//!
//! Lists the files directly inside one storage directory, filtered by
//! extension. Listing order is whatever the filesystem yields; callers that
//! care about order (the file map builder) take it as given.

use std::path::Path;
use walkdir::WalkDir;

/// Extensions accepted for uploaded images
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// Extensions accepted for generated audio
pub const AUDIO_EXTENSIONS: &[&str] = &[".wav", ".mp3"];

/// Extension-filtered, non-recursive file scanner
#[derive(Debug, Clone)]
pub struct FileScanner {
    /// Lowercase extensions including the leading dot
    extensions: Vec<String>,
}

impl FileScanner {
    /// Create a scanner accepting the given extensions (case-insensitive, leading dot)
    pub fn new(extensions: &[&str]) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    /// Scanner for image files
    pub fn images() -> Self {
        Self::new(IMAGE_EXTENSIONS)
    }

    /// Scanner for audio files
    pub fn audio() -> Self {
        Self::new(AUDIO_EXTENSIONS)
    }

    /// Whether a filename carries one of the accepted extensions
    pub fn accepts(&self, filename: &str) -> bool {
        match Path::new(filename).extension() {
            Some(ext) => {
                let dotted = format!(".{}", ext.to_string_lossy().to_lowercase());
                self.extensions.iter().any(|e| *e == dotted)
            }
            None => false,
        }
    }

    /// List accepted filenames in `dir`
    ///
    /// A missing directory yields an empty list; storage directories are
    /// created at startup, so this only happens if they were removed by hand.
    pub fn scan(&self, dir: &Path) -> Vec<String> {
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "Scan directory missing, treating as empty");
            return Vec::new();
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false);

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let Some(name) = entry.file_name().to_str() else {
                        tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 filename");
                        continue;
                    };
                    if self.accepts(name) {
                        files.push(name.to_string());
                    }
                }
                Err(e) => {
                    // Keep scanning, one bad entry should not hide the rest
                    tracing::warn!("Error accessing entry: {}", e);
                }
            }
        }

        tracing::debug!(dir = %dir.display(), count = files.len(), "Directory scanned");
        files
    }
}
