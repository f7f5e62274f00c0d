//! Unibuilds and their resources
//!
//! A unibuild is the compiled output of one package for one architecture.

use crate::watch::WatchSet;
use isle_package::{Arch, ArchDescriptor, Export, FileOptions, PackageDescriptor, PackageUse};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Stable identity of a unibuild
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnibuildId {
    /// Package name; empty for the app
    pub package: String,
    pub arch: Arch,
    pub kind: String,
}

impl fmt::Display for UnibuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}#{}", self.package, self.arch, self.kind)
    }
}

/// What a compiled output contributes to the program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompiledKind {
    Js,
    Css,
    Head,
    Body,
}

/// A classified input or output of a unibuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// A static file served or bundled as-is
    Asset {
        path: String,
        serve_path: String,
        data: Vec<u8>,
        hash: String,
    },
    /// Raw source for a compiler plugin (or native source), processed later
    Source {
        extension: String,
        path: String,
        data: Vec<u8>,
        hash: String,
        file_options: FileOptions,
    },
    /// Output produced by a legacy handler
    Compiled {
        kind: CompiledKind,
        path: String,
        data: Vec<u8>,
        source_path: String,
    },
}

impl Resource {
    /// Build an asset resource for a file of `descriptor`
    ///
    /// App assets lose a leading `public/` or `private/`; package assets keep
    /// their relative path under the package serve root.
    pub fn asset(
        descriptor: &PackageDescriptor,
        rel_path: &str,
        data: Vec<u8>,
        hash: String,
    ) -> Self {
        let path = if descriptor.is_app() {
            rel_path
                .strip_prefix("public/")
                .or_else(|| rel_path.strip_prefix("private/"))
                .unwrap_or(rel_path)
        } else {
            rel_path
        };
        let serve_path = format!("{}{}", descriptor.serve_root(), path).replace(':', "_");

        Self::Asset {
            path: path.to_string(),
            serve_path,
            data,
            hash,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Asset { path, .. } | Self::Source { path, .. } | Self::Compiled { path, .. } => {
                path
            }
        }
    }

    pub fn is_asset(&self) -> bool {
        matches!(self, Self::Asset { .. })
    }
}

/// Native module state of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeDependencies {
    pub node_modules_path: PathBuf,
    /// Whether the installed modules run on every server variant
    pub portable: bool,
}

/// Lockfile recorded in the watch-set when native modules are present
pub const LOCKFILE_NAME: &str = "npm-shrinkwrap.json";

impl NativeDependencies {
    pub fn new(node_modules_path: impl Into<PathBuf>) -> Self {
        Self {
            node_modules_path: node_modules_path.into(),
            portable: true,
        }
    }

    pub fn non_portable(mut self) -> Self {
        self.portable = false;
        self
    }

    /// The lockfile next to the module directory
    pub fn lockfile_path(&self) -> PathBuf {
        match self.node_modules_path.parent() {
            Some(parent) => parent.join(LOCKFILE_NAME),
            None => PathBuf::from(LOCKFILE_NAME),
        }
    }
}

/// The compiled output of one package for one architecture
#[derive(Debug, Clone, PartialEq)]
pub struct Unibuild {
    /// Package name; empty for the app
    pub package: String,
    pub kind: String,
    pub arch: Arch,
    pub uses: Vec<PackageUse>,
    pub implies: Vec<PackageUse>,
    pub watch_set: WatchSet,
    pub node_modules_path: Option<PathBuf>,
    pub declared_exports: Vec<Export>,
    pub resources: Vec<Resource>,
}

impl Unibuild {
    pub fn id(&self) -> UnibuildId {
        UnibuildId {
            package: self.package.clone(),
            arch: self.arch.clone(),
            kind: self.kind.clone(),
        }
    }
}

/// Assemble a unibuild from classified resources
///
/// A generic `os` unibuild with non-portable native modules is narrowed to
/// the host architecture. Native modules are dropped from non-server
/// unibuilds.
pub fn assemble_unibuild(
    package: &str,
    source_arch: &ArchDescriptor,
    resources: Vec<Resource>,
    watch_set: WatchSet,
    native: Option<&NativeDependencies>,
    host_arch: &Arch,
) -> Unibuild {
    let declared_exports = source_arch
        .exports
        .iter()
        .map(|export| Export {
            name: export.name.clone(),
            test_only: export.test_only,
        })
        .collect();

    let mut arch = source_arch.arch.clone();
    if arch.is_generic_server() && native.map_or(false, |n| !n.portable) {
        debug!(package, host = %host_arch, "narrowing non-portable unibuild to host");
        arch = host_arch.clone();
    }

    let node_modules_path = native
        .filter(|_| arch.is_server())
        .map(|n| n.node_modules_path.clone());

    Unibuild {
        package: package.to_string(),
        kind: source_arch.kind.clone(),
        arch,
        uses: source_arch.uses.clone(),
        implies: source_arch.implies.clone(),
        watch_set,
        node_modules_path,
        declared_exports,
        resources,
    }
}
