//! Source listers
//!
//! A lister is bound to one architecture of one package. Given the extensions
//! of interest it yields source items, plus a watch-set of whatever it
//! consulted to find them (directory listings, not file contents).

use crate::error::{BuildError, BuildResult};
use crate::fingerprint::FileReader;
use crate::registry::{dotted_suffixes, SourceExtensions};
use crate::watch::{DirectoryObservation, WatchSet};
use isle_package::{Arch, SourceItem, MANIFEST_FILE};
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directories never descended into; dot-directories are skipped as well
const IGNORED_DIRS: [&str; 2] = ["node_modules", ".isle"];

/// Lists the source files of one architecture
pub trait SourceLister: Send + Sync {
    fn list(&self, extensions: &SourceExtensions) -> BuildResult<(Vec<SourceItem>, WatchSet)>;
}

/// Sources declared explicitly in the package manifest
#[derive(Debug, Clone, Default)]
pub struct DeclaredSources {
    items: Vec<SourceItem>,
}

impl DeclaredSources {
    pub fn new(items: Vec<SourceItem>) -> Self {
        Self { items }
    }
}

impl SourceLister for DeclaredSources {
    fn list(&self, _extensions: &SourceExtensions) -> BuildResult<(Vec<SourceItem>, WatchSet)> {
        Ok((self.items.clone(), WatchSet::new()))
    }
}

/// Finds sources by walking a package's source root
///
/// Files ending in an extension of interest become sources. Everything under
/// `public/` (client arches) or `private/` (server arches) becomes an asset.
/// `client/` directories are skipped on the server and `server/` directories
/// on the client.
pub struct DirectoryLister<'a> {
    source_root: PathBuf,
    arch: Arch,
    reader: &'a dyn FileReader,
}

impl<'a> DirectoryLister<'a> {
    pub fn new(source_root: impl Into<PathBuf>, arch: Arch, reader: &'a dyn FileReader) -> Self {
        Self {
            source_root: source_root.into(),
            arch,
            reader,
        }
    }

    /// The top-level directory that holds this arch's assets
    fn asset_dir(&self) -> &'static str {
        if self.arch.is_server() {
            "private"
        } else {
            "public"
        }
    }

    /// Top-level directories excluded for this arch
    fn excluded_dirs(&self) -> [&'static str; 2] {
        if self.arch.is_server() {
            ["client", "public"]
        } else {
            ["server", "private"]
        }
    }

    fn is_skipped(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        let name: &str = &name;
        if name.starts_with('.') || IGNORED_DIRS.contains(&name) {
            return true;
        }
        // `client`/`server` apply at any depth; asset roots only at the top
        match name {
            "client" | "server" => self.excluded_dirs().contains(&name),
            "public" | "private" => entry.depth() == 1 && self.excluded_dirs().contains(&name),
            _ => false,
        }
    }

    fn rel_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.source_root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

impl SourceLister for DirectoryLister<'_> {
    fn list(&self, extensions: &SourceExtensions) -> BuildResult<(Vec<SourceItem>, WatchSet)> {
        let mut watch_set = WatchSet::new();
        let mut items = Vec::new();
        let source_extensions: Vec<String> = extensions.keys().cloned().collect();

        let walker = WalkDir::new(&self.source_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_skipped(entry));

        for entry in walker {
            let entry = entry.map_err(|e| BuildError::source_listing(&self.source_root, e))?;
            let Some(rel_path) = self.rel_path(entry.path()) else {
                continue;
            };
            let in_assets = rel_path == self.asset_dir()
                || rel_path.starts_with(&format!("{}/", self.asset_dir()));

            if entry.file_type().is_dir() {
                let names = self.reader.list_dir(entry.path()).ok_or_else(|| {
                    BuildError::source_listing(entry.path(), "directory could not be listed")
                })?;
                let watched: &[String] = if in_assets { &[] } else { &source_extensions };
                watch_set.add_directory(DirectoryObservation::new(entry.path(), watched, names));
                continue;
            }

            // Hidden files are neither listed nor observed
            let file_name = entry.file_name().to_string_lossy();
            if file_name.starts_with('.') {
                continue;
            }

            if in_assets {
                items.push(SourceItem::asset(rel_path));
                continue;
            }

            if entry.depth() == 1 && file_name == MANIFEST_FILE {
                continue;
            }
            if dotted_suffixes(&file_name).any(|ext| extensions.contains_key(ext)) {
                items.push(SourceItem::new(rel_path));
            }
        }

        sort_load_order(&mut items, extensions);
        Ok((items, watch_set))
    }
}

/// Sort sources into load order
///
/// Templates load first, then files under a `lib/` directory, then deeper
/// paths before shallower ones; `main.*` files load last. Ties are broken
/// alphabetically. Assets keep their place after all sources.
pub fn sort_load_order(items: &mut [SourceItem], extensions: &SourceExtensions) {
    items.sort_by_cached_key(|item| {
        let is_template = dotted_suffixes(item.file_name())
            .find_map(|ext| extensions.get(ext).copied())
            .unwrap_or(false);
        let depth = item.rel_path.matches('/').count();
        let in_lib = item.rel_path.split('/').rev().skip(1).any(|dir| dir == "lib");
        let is_main = item.file_name().starts_with("main.");
        (
            item.options.is_asset,
            !is_template,
            !in_lib,
            Reverse(depth),
            is_main,
            item.rel_path.clone(),
        )
    });
}
