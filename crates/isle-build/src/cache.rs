//! Already-built packages visible to a compilation

use crate::plugin::SourceProcessor;
use crate::unibuild::Unibuild;
use crate::watch::WatchSet;
use isle_package::{most_specific_match, Arch};
use std::collections::HashMap;

/// A package whose unibuilds have been compiled
#[derive(Debug, Clone, Default)]
pub struct BuiltPackage {
    /// Package name; empty for the app
    pub name: String,
    pub debug_only: bool,
    pub plugins: Vec<SourceProcessor>,
    /// Files whose change could change the plugins this package provides
    pub plugin_watch_set: WatchSet,
    pub unibuilds: Vec<Unibuild>,
}

impl BuiltPackage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_unibuild(mut self, unibuild: Unibuild) -> Self {
        self.unibuilds.push(unibuild);
        self
    }

    pub fn with_plugin(mut self, plugin: impl Into<SourceProcessor>) -> Self {
        self.plugins.push(plugin.into());
        self
    }

    pub fn debug_only(mut self) -> Self {
        self.debug_only = true;
        self
    }

    pub fn has_plugins(&self) -> bool {
        !self.plugins.is_empty()
    }

    /// The unibuild to use when building for `arch`
    pub fn unibuild_at_arch(&self, arch: &Arch) -> Option<&Unibuild> {
        let chosen = most_specific_match(arch, self.unibuilds.iter().map(|u| &u.arch))?;
        self.unibuilds.iter().find(|u| &u.arch == chosen)
    }
}

/// Lookup of built packages by name
pub trait PackageCache: Send + Sync {
    fn get(&self, name: &str) -> Option<&BuiltPackage>;

    /// A package's unibuild for an architecture
    fn unibuild_at_arch(&self, name: &str, arch: &Arch) -> Option<(&BuiltPackage, &Unibuild)> {
        let package = self.get(name)?;
        let unibuild = package.unibuild_at_arch(arch)?;
        Some((package, unibuild))
    }
}

/// In-memory `PackageCache`
#[derive(Debug, Clone, Default)]
pub struct MemoryPackageCache {
    packages: HashMap<String, BuiltPackage>,
}

impl MemoryPackageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a package
    pub fn insert(&mut self, package: BuiltPackage) {
        self.packages.insert(package.name.clone(), package);
    }

    pub fn with_package(mut self, package: BuiltPackage) -> Self {
        self.insert(package);
        self
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl PackageCache for MemoryPackageCache {
    fn get(&self, name: &str) -> Option<&BuiltPackage> {
        self.packages.get(name)
    }
}
