//! Watch-sets for cache invalidation
//!
//! A `WatchSet` records everything observed while deciding what to build:
//! file contents (by fingerprint, or their absence) and directory listings.
//! A cached unibuild stays valid for as long as every observation in its
//! watch-set still holds.
//!
//! Merging is a union. It is commutative, associative and idempotent, so
//! partial sets gathered while probing a file can simply be dropped when the
//! file turns out to be irrelevant.

use crate::error::BuildResult;
use crate::fingerprint::{FileRead, FileReader};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A directory listing observation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DirectoryObservation {
    pub path: PathBuf,
    /// Extensions of interest, sorted; empty means every file
    pub extensions: Vec<String>,
    /// Matching entry names, sorted; subdirectories end with `/`
    pub names: Vec<String>,
}

impl DirectoryObservation {
    pub fn new(path: impl Into<PathBuf>, extensions: &[String], names: Vec<String>) -> Self {
        let mut extensions = extensions.to_vec();
        extensions.sort();
        extensions.dedup();
        let names = filter_entries(names, &extensions);
        Self {
            path: path.into(),
            extensions,
            names,
        }
    }
}

/// Keep the directory entries a listing for `extensions` would see
///
/// Subdirectories (names ending in `/`) are kept unless hidden. Files are kept
/// when they end in `.<ext>` for one of `extensions`, or always when
/// `extensions` is empty. The result is sorted.
pub fn filter_entries(names: Vec<String>, extensions: &[String]) -> Vec<String> {
    let mut kept: Vec<String> = names
        .into_iter()
        .filter(|name| {
            if name.starts_with('.') {
                return false;
            }
            if name.ends_with('/') {
                return true;
            }
            extensions.is_empty()
                || extensions
                    .iter()
                    .any(|ext| name.len() > ext.len() + 1 && name.ends_with(&format!(".{}", ext)))
        })
        .collect();
    kept.sort();
    kept.dedup();
    kept
}

/// Accumulated filesystem observations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSet {
    /// Absolute path -> fingerprint, `None` when observed absent
    files: BTreeMap<PathBuf, Option<String>>,
    directories: BTreeSet<DirectoryObservation>,
    /// Set when two observations of one file disagree
    always_fire: bool,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file observation
    pub fn add_file(&mut self, path: impl Into<PathBuf>, hash: Option<String>) {
        let path = path.into();
        match self.files.get_mut(&path) {
            Some(existing) if *existing != hash => {
                // Keep the smaller so the result does not depend on merge order
                if hash < *existing {
                    *existing = hash;
                }
                self.always_fire = true;
            }
            Some(_) => {}
            None => {
                self.files.insert(path, hash);
            }
        }
    }

    /// Record a directory listing observation
    pub fn add_directory(&mut self, observation: DirectoryObservation) {
        self.directories.insert(observation);
    }

    /// Union another watch-set into this one
    pub fn merge(&mut self, other: &WatchSet) {
        for (path, hash) in &other.files {
            self.add_file(path.clone(), hash.clone());
        }
        self.directories.extend(other.directories.iter().cloned());
        self.always_fire |= other.always_fire;
    }

    /// Mark this set as permanently stale
    pub fn set_always_fire(&mut self) {
        self.always_fire = true;
    }

    pub fn always_fire(&self) -> bool {
        self.always_fire
    }

    /// Whether a file has been observed
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// The recorded fingerprint of a file, if it was observed present
    pub fn file_hash(&self, path: &Path) -> Option<&str> {
        self.files.get(path).and_then(|h| h.as_deref())
    }

    /// Every observed file path, sorted
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn directories(&self) -> impl Iterator<Item = &DirectoryObservation> {
        self.directories.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty() && !self.always_fire
    }

    /// Re-check every observation against the filesystem
    pub fn is_up_to_date(&self, reader: &dyn FileReader) -> bool {
        if self.always_fire {
            debug!("watch set marked always-fire");
            return false;
        }

        for (path, hash) in &self.files {
            let current = reader.read_and_hash(path).map(|read| read.hash);
            if current != *hash {
                debug!(path = %path.display(), "watched file changed");
                return false;
            }
        }

        for observation in &self.directories {
            let names = reader.list_dir(&observation.path).unwrap_or_default();
            if filter_entries(names, &observation.extensions) != observation.names {
                debug!(path = %observation.path.display(), "watched directory changed");
                return false;
            }
        }

        true
    }

    /// Serialize for the external build cache
    pub fn to_json(&self) -> BuildResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize a watch-set written by `to_json`
    pub fn from_json(json: &str) -> BuildResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Read a file, recording the observation
pub fn read_and_watch_file(
    watch_set: &mut WatchSet,
    reader: &dyn FileReader,
    path: &Path,
) -> Option<Vec<u8>> {
    read_and_watch_file_with_hash(watch_set, reader, path).map(|read| read.contents)
}

/// Read a file with its fingerprint, recording the observation
pub fn read_and_watch_file_with_hash(
    watch_set: &mut WatchSet,
    reader: &dyn FileReader,
    path: &Path,
) -> Option<FileRead> {
    let read = reader.read_and_hash(path);
    watch_set.add_file(path, read.as_ref().map(|r| r.hash.clone()));
    read
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{hash_bytes, FsReader};
    use std::fs;
    use tempfile::TempDir;

    fn ext(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filter_entries() {
        let names = ext(&["b.js", "a.less", ".git/", "lib/", "c.spec.js", "README", "js"]);
        assert_eq!(
            filter_entries(names.clone(), &ext(&["js"])),
            ext(&["b.js", "c.spec.js", "lib/"])
        );
        assert_eq!(
            filter_entries(names, &[]),
            ext(&["README", "a.less", "b.js", "c.spec.js", "js", "lib/"])
        );
    }

    #[test]
    fn test_conflicting_hashes_fire() {
        let mut first = WatchSet::new();
        first.add_file("/p/a.js", Some("aa".to_string()));
        let mut second = WatchSet::new();
        second.add_file("/p/a.js", Some("bb".to_string()));

        let mut left = first.clone();
        left.merge(&second);
        let mut right = second.clone();
        right.merge(&first);

        assert!(left.always_fire());
        assert_eq!(left, right);
    }

    #[test]
    fn test_read_and_watch_records_absence() {
        let temp_dir = TempDir::new().unwrap();
        let present = temp_dir.path().join("a.js");
        let absent = temp_dir.path().join("b.js");
        fs::write(&present, "x").unwrap();

        let mut watch_set = WatchSet::new();
        assert_eq!(
            read_and_watch_file(&mut watch_set, &FsReader, &present),
            Some(b"x".to_vec())
        );
        assert!(read_and_watch_file(&mut watch_set, &FsReader, &absent).is_none());

        assert_eq!(watch_set.file_hash(&present), Some(hash_bytes(b"x").as_str()));
        assert!(watch_set.contains(&absent));
        assert!(watch_set.file_hash(&absent).is_none());
        assert!(watch_set.is_up_to_date(&FsReader));

        fs::write(&absent, "now here").unwrap();
        assert!(!watch_set.is_up_to_date(&FsReader));
    }

    #[test]
    fn test_directory_observation_staleness() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.js"), "").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "").unwrap();

        let extensions = ext(&["js"]);
        let names = FsReader.list_dir(temp_dir.path()).unwrap();
        let mut watch_set = WatchSet::new();
        watch_set.add_directory(DirectoryObservation::new(temp_dir.path(), &extensions, names));
        assert!(watch_set.is_up_to_date(&FsReader));

        // Files outside the extensions of interest do not invalidate
        fs::write(temp_dir.path().join("other.txt"), "").unwrap();
        assert!(watch_set.is_up_to_date(&FsReader));

        fs::write(temp_dir.path().join("b.js"), "").unwrap();
        assert!(!watch_set.is_up_to_date(&FsReader));
    }

    #[test]
    fn test_json_round_trip() {
        let mut watch_set = WatchSet::new();
        watch_set.add_file("/p/a.js", Some(hash_bytes(b"a")));
        watch_set.add_file("/p/gone.js", None);
        watch_set.add_directory(DirectoryObservation::new("/p", &ext(&["js"]), ext(&["a.js"])));

        let json = watch_set.to_json().unwrap();
        assert_eq!(WatchSet::from_json(&json).unwrap(), watch_set);
        assert!(WatchSet::from_json("{not json").is_err());
    }
}
