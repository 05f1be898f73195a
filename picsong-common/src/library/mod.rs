//! Reconciliation of the storage directories
//!
//! Filenames are reduced to logical names, each directory is collapsed to
//! one file per logical name (newest wins) and the image and audio maps are
//! joined into [`MatchedRecord`]s.

pub mod file_map;
pub mod matcher;
pub mod naming;
pub mod scanner;

pub use file_map::{build_file_map, DirStat, FileMap, ModifiedTime};
pub use matcher::{collect_records, match_records, DirPrompts, MatchedRecord, PromptSource};
pub use naming::{audio_logical_name, image_logical_name, strip_timestamp_suffix};
pub use scanner::{FileScanner, AUDIO_EXTENSIONS, IMAGE_EXTENSIONS};
