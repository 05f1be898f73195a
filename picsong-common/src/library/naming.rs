//! Logical name resolution
//!
//! Uploaded images are stored as `<stem>-<unix-millis>.<ext>` so that repeated
//! uploads of the same original file never overwrite each other on disk. The
//! logical name drops that suffix again, which lets the newest upload take over
//! the `<name>.wav` / `<name>.txt` outputs generated for it.
//!
//! Audio and prompt files are always written under the final logical name, so
//! the audio resolver only strips the extension.

use std::path::Path;

/// Filename without its extension (`file_stem` semantics)
fn stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}

/// Remove a trailing `-<digits>` segment, if present
///
/// Only the segment after the *last* dash is considered, and it must be
/// non-empty and consist of ASCII decimal digits only.
pub fn strip_timestamp_suffix(stem: &str) -> &str {
    match stem.rsplit_once('-') {
        Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => head,
        _ => stem,
    }
}

/// Logical name of an uploaded image: stem with any timestamp suffix removed
pub fn image_logical_name(filename: &str) -> String {
    strip_timestamp_suffix(stem(filename)).to_string()
}

/// Logical name of a generated audio (or prompt) file: the plain stem
pub fn audio_logical_name(filename: &str) -> String {
    stem(filename).to_string()
}
