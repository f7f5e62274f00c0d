//! Package descriptor types
//!
//! A descriptor is the immutable, per-compilation view of one package: its
//! identity, the architectures it declares, and for each architecture the
//! use edges, implied edges, exports and (optionally) declared source items.

use crate::arch::Arch;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The default unibuild kind
pub const MAIN_KIND: &str = "main";

/// A loaded package descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    /// Package name (`None` for the top-level application)
    pub name: Option<String>,
    pub version: Option<semver::Version>,
    pub summary: Option<String>,
    /// Only included in development builds
    pub debug_only: bool,
    /// Test package (sees test-only exports of its dependencies)
    pub is_test: bool,
    /// Directory that relative source paths resolve against
    pub source_root: PathBuf,
    /// Native (npm-style) dependencies, name -> version
    pub native_dependencies: BTreeMap<String, String>,
    pub architectures: Vec<ArchDescriptor>,
}

impl PackageDescriptor {
    /// Create a descriptor for a named package with no architectures
    pub fn new(name: impl Into<String>, source_root: impl Into<PathBuf>) -> Self {
        Self {
            name: Some(name.into()),
            version: None,
            summary: None,
            debug_only: false,
            is_test: false,
            source_root: source_root.into(),
            native_dependencies: BTreeMap::new(),
            architectures: Vec::new(),
        }
    }

    /// Create a descriptor for the top-level application
    pub fn app(source_root: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            ..Self::new("", source_root)
        }
    }

    /// Add an architecture
    pub fn with_arch(mut self, arch: ArchDescriptor) -> Self {
        self.architectures.push(arch);
        self
    }

    /// Whether this is the top-level application
    pub fn is_app(&self) -> bool {
        self.name.is_none()
    }

    /// Name used in messages
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("the app")
    }

    /// Name used as a map key; the app uses the empty string
    pub fn key(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// URL prefix under which this package's assets are served
    pub fn serve_root(&self) -> String {
        match &self.name {
            None => "/".to_string(),
            Some(name) => format!("/packages/{}/", name),
        }
    }

    /// Get the descriptor for an architecture
    pub fn arch(&self, arch: &Arch) -> Option<&ArchDescriptor> {
        self.architectures.iter().find(|a| &a.arch == arch)
    }
}

/// One architecture of a package
#[derive(Debug, Clone, PartialEq)]
pub struct ArchDescriptor {
    pub arch: Arch,
    /// Unibuild kind, part of the unibuild identity
    pub kind: String,
    pub uses: Vec<PackageUse>,
    pub implies: Vec<PackageUse>,
    pub exports: Vec<Export>,
    /// Declared source items; `None` means list the source root
    pub sources: Option<Vec<SourceItem>>,
}

impl ArchDescriptor {
    pub fn new(arch: Arch) -> Self {
        Self {
            arch,
            kind: MAIN_KIND.to_string(),
            uses: Vec::new(),
            implies: Vec::new(),
            exports: Vec::new(),
            sources: None,
        }
    }

    pub fn with_use(mut self, package_use: PackageUse) -> Self {
        self.uses.push(package_use);
        self
    }

    pub fn with_imply(mut self, package_use: PackageUse) -> Self {
        self.implies.push(package_use);
        self
    }

    pub fn with_export(mut self, export: Export) -> Self {
        self.exports.push(export);
        self
    }

    pub fn with_source(mut self, item: SourceItem) -> Self {
        self.sources.get_or_insert_with(Vec::new).push(item);
        self
    }
}

/// A dependency edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageUse {
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    /// Visible for ordering only, never for plugin discovery
    #[serde(default)]
    pub weak: bool,
    /// Excluded from build-time (plugin) visibility graphs
    #[serde(default)]
    pub unordered: bool,
    /// Package whose `imply` synthesized this edge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implied_by: Option<String>,
}

impl PackageUse {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            constraint: None,
            weak: false,
            unordered: false,
            implied_by: None,
        }
    }

    pub fn weak(mut self) -> Self {
        self.weak = true;
        self
    }

    pub fn unordered(mut self) -> Self {
        self.unordered = true;
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    pub fn implied_by(mut self, package: impl Into<String>) -> Self {
        self.implied_by = Some(package.into());
        self
    }
}

/// A declared export symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Export {
    pub name: String,
    #[serde(default)]
    pub test_only: bool,
}

impl Export {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            test_only: false,
        }
    }

    pub fn test_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            test_only: true,
        }
    }
}

/// A source file produced by a lister
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    /// Path relative to the package source root, `/`-separated
    pub rel_path: String,
    #[serde(default)]
    pub options: FileOptions,
}

impl SourceItem {
    pub fn new(rel_path: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            options: FileOptions::default(),
        }
    }

    pub fn asset(rel_path: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            options: FileOptions { is_asset: true },
        }
    }

    /// Final path component
    pub fn file_name(&self) -> &str {
        self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path)
    }
}

/// Per-file options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOptions {
    /// Always treat as a static asset
    #[serde(default)]
    pub is_asset: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_descriptor() {
        let app = PackageDescriptor::app("/src/app");
        assert!(app.is_app());
        assert_eq!(app.display_name(), "the app");
        assert_eq!(app.key(), "");
        assert_eq!(app.serve_root(), "/");
    }

    #[test]
    fn test_package_serve_root() {
        let pkg = PackageDescriptor::new("less", "/src/less");
        assert!(!pkg.is_app());
        assert_eq!(pkg.serve_root(), "/packages/less/");
    }

    #[test]
    fn test_source_item_file_name() {
        assert_eq!(SourceItem::new("client/lib/a.spec.js").file_name(), "a.spec.js");
        assert_eq!(SourceItem::new("main.js").file_name(), "main.js");
        assert!(SourceItem::asset("public/logo.png").options.is_asset);
    }

    #[test]
    fn test_arch_lookup() {
        let pkg = PackageDescriptor::new("p", "/p")
            .with_arch(ArchDescriptor::new(Arch::os()))
            .with_arch(ArchDescriptor::new(Arch::web_browser()));
        assert!(pkg.arch(&Arch::os()).is_some());
        assert!(pkg.arch(&Arch::web_cordova()).is_none());
    }
}
