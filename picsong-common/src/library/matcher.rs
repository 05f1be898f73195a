//! Cross-directory matcher
//!
//! Joins the image and audio maps by logical name and attaches the optional
//! prompt text. A name is reported only once both its image and its audio
//! exist, so an image whose generation failed halfway stays hidden until it
//! is regenerated successfully.

use super::file_map::{build_file_map, DirStat, FileMap, ModifiedTime};
use super::naming::{audio_logical_name, image_logical_name};
use super::scanner::FileScanner;
use crate::storage::StorageLayout;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::PathBuf;

/// One image/audio pair ready for presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedRecord {
    pub image_url: String,
    pub audio_url: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Source of prompt text by logical name
pub trait PromptSource {
    /// Prompt for `name`, or `None` if missing or unreadable
    fn prompt(&self, name: &str) -> Option<String>;
}

/// Prompts stored as `<name>.txt` in a directory
#[derive(Debug, Clone)]
pub struct DirPrompts {
    dir: PathBuf,
}

impl DirPrompts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PromptSource for DirPrompts {
    fn prompt(&self, name: &str) -> Option<String> {
        let path = self.dir.join(StorageLayout::prompt_filename(name));
        match std::fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable prompt file, omitting prompt");
                None
            }
        }
    }
}

impl PromptSource for HashMap<String, String> {
    fn prompt(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Join two file maps into records, newest image first
///
/// Keys are the union of both maps (image names first, in listing order),
/// but a record is emitted only when both maps resolve the name. The final
/// sort is stable, so equal image times keep that emission order.
pub fn match_records<S, P>(
    images: &FileMap,
    audio: &FileMap,
    image_stat: &S,
    prompts: &P,
) -> Vec<MatchedRecord>
where
    S: ModifiedTime + ?Sized,
    P: PromptSource + ?Sized,
{
    let mut seen = HashSet::new();
    let keys: Vec<&str> = images
        .names()
        .chain(audio.names())
        .filter(|name| seen.insert(*name))
        .collect();

    let mut timed = Vec::new();
    for name in keys {
        let (Some(image_file), Some(audio_file)) = (images.get(name), audio.get(name)) else {
            continue;
        };

        let record = MatchedRecord {
            image_url: StorageLayout::image_url(image_file),
            audio_url: StorageLayout::audio_url(audio_file),
            name: name.to_string(),
            prompt: prompts.prompt(name),
        };
        timed.push((image_stat.modified_or_epoch(image_file), record));
    }

    timed.sort_by(|a, b| b.0.cmp(&a.0));
    timed.into_iter().map(|(_, record)| record).collect()
}

/// Scan the storage directories and return the matched records
///
/// Always reflects the directories at call time; nothing is cached.
pub fn collect_records(layout: &StorageLayout) -> Vec<MatchedRecord> {
    let uploads = layout.uploads_dir();
    let outputs = layout.outputs_dir();

    let image_stat = DirStat::new(&uploads);
    let audio_stat = DirStat::new(&outputs);

    let image_files = FileScanner::images().scan(&uploads);
    let audio_files = FileScanner::audio().scan(&outputs);

    let images = build_file_map(&image_files, image_logical_name, &image_stat);
    let audio = build_file_map(&audio_files, audio_logical_name, &audio_stat);

    let records = match_records(&images, &audio, &image_stat, &DirPrompts::new(layout.prompts_dir()));

    tracing::debug!(
        images = images.len(),
        audio = audio.len(),
        matched = records.len(),
        "Storage reconciled"
    );

    records
}
