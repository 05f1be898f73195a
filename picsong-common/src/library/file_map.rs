//! File reconciliation map
//!
//! Groups the files of one directory by logical name and keeps the most
//! recently modified file for each name. The builder is a pure function over
//! filenames and an injected modification-time lookup, so it can be exercised
//! without a real filesystem.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Modification-time lookup for files of one directory
pub trait ModifiedTime {
    /// Modification time of `filename`, or `None` if it cannot be determined
    fn modified(&self, filename: &str) -> Option<SystemTime>;

    /// Modification time with unknown files demoted to the epoch
    fn modified_or_epoch(&self, filename: &str) -> SystemTime {
        self.modified(filename).unwrap_or(UNIX_EPOCH)
    }
}

/// Filesystem-backed lookup relative to a directory
#[derive(Debug, Clone)]
pub struct DirStat {
    dir: PathBuf,
}

impl DirStat {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ModifiedTime for DirStat {
    fn modified(&self, filename: &str) -> Option<SystemTime> {
        let path = self.dir.join(filename);
        match std::fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(time) => Some(time),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Could not stat file");
                None
            }
        }
    }
}

impl ModifiedTime for HashMap<String, SystemTime> {
    fn modified(&self, filename: &str) -> Option<SystemTime> {
        self.get(filename).copied()
    }
}

/// Logical name → winning filename, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMap {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl FileMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Winning filename for a logical name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|&i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Logical names in the order they were first seen
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a new name or replace the file of an existing one (position kept)
    fn upsert(&mut self, name: String, filename: String) {
        match self.index.get(&name) {
            Some(&i) => self.entries[i].1 = filename,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, filename));
            }
        }
    }
}

/// Build the reconciliation map for one directory listing
///
/// Filenames are visited in listing order. On a logical-name collision the
/// candidate replaces the current winner only when it is strictly newer; a
/// tie or an older candidate leaves the map unchanged. Files whose
/// modification time cannot be read compare as the epoch.
pub fn build_file_map<F, S>(filenames: &[String], resolve: F, stat: &S) -> FileMap
where
    F: Fn(&str) -> String,
    S: ModifiedTime + ?Sized,
{
    let mut map = FileMap::new();

    for filename in filenames {
        let name = resolve(filename);

        let replace = match map.get(&name) {
            None => true,
            Some(existing) => stat.modified_or_epoch(filename) > stat.modified_or_epoch(existing),
        };

        if replace {
            if let Some(existing) = map.get(&name) {
                tracing::debug!(logical_name = %name, old = %existing, new = %filename, "Newer file wins");
            }
            map.upsert(name, filename.clone());
        }
    }

    map
}
