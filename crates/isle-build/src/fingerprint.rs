//! File reading and content fingerprints
//!
//! Everything the compiler reads from disk goes through a `FileReader` so the
//! watch-set can later re-read the same paths and compare fingerprints.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Compute the lowercase hex SHA-256 of some bytes
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Contents and fingerprint of a file that was read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRead {
    pub contents: Vec<u8>,
    pub hash: String,
}

impl FileRead {
    pub fn new(contents: Vec<u8>) -> Self {
        let hash = hash_bytes(&contents);
        Self { contents, hash }
    }
}

/// Read-only filesystem access used by the compiler
pub trait FileReader: Send + Sync {
    /// Read a file; `None` when it is absent or unreadable
    fn read(&self, path: &Path) -> Option<Vec<u8>>;

    /// Names of the entries of a directory; `None` when it cannot be listed
    fn list_dir(&self, path: &Path) -> Option<Vec<String>>;

    /// Read a file and compute its fingerprint
    fn read_and_hash(&self, path: &Path) -> Option<FileRead> {
        self.read(path).map(FileRead::new)
    }
}

/// `FileReader` backed by the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl FileReader for FsReader {
    fn read(&self, path: &Path) -> Option<Vec<u8>> {
        fs::read(path).ok()
    }

    fn list_dir(&self, path: &Path) -> Option<Vec<String>> {
        let entries = fs::read_dir(path).ok()?;
        Some(
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| {
                    let mut name = entry.file_name().to_string_lossy().into_owned();
                    if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                        name.push('/');
                    }
                    name
                })
                .collect(),
        )
    }
}

/// Join a `/`-separated relative path onto a root
pub fn resolve_rel_path(root: &Path, rel_path: &str) -> PathBuf {
    rel_path
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |path, part| path.join(part))
}
