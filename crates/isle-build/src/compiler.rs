//! Package compilation
//!
//! Drives the pipeline for one package: for each architecture, resolve the
//! active plugins, build the extension registry, list and classify sources,
//! and assemble a unibuild.

use crate::cache::{BuiltPackage, PackageCache};
use crate::classify::Classifier;
use crate::diagnostics::Diagnostics;
use crate::error::{BuildError, BuildResult};
use crate::fingerprint::{FileReader, FsReader};
use crate::lint::lint_unibuild;
use crate::minify;
use crate::plugin::{MinifierPlugin, SourceProcessor};
use crate::registry::{PluginRegistry, PluginScope};
use crate::sources::{DeclaredSources, DirectoryLister, SourceLister};
use crate::unibuild::{assemble_unibuild, NativeDependencies, Unibuild};
use crate::watch::{read_and_watch_file, WatchSet};
use isle_config::CompilerSettings;
use isle_package::{
    Arch, ArchDescriptor, PackageDescriptor, PackageError, PackageManifest, Validator,
    MANIFEST_FILE,
};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

static FS_READER: FsReader = FsReader;

/// Where a package's native modules are installed, relative to its root
pub const NATIVE_MODULES_DIR: &str = ".npm/package/node_modules";

/// Compilation options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Architecture plugins run on
    pub host_arch: Arch,
    /// Compile `web.cordova` architectures
    pub include_cordova_unibuild: bool,
    /// Compile architectures concurrently
    pub parallel: bool,
    /// Run linters in `PackageCompiler::lint`
    pub lint: bool,
    /// Report the packages that provided plugins
    pub include_plugin_provider_names: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            host_arch: Arch::host(),
            include_cordova_unibuild: false,
            parallel: true,
            lint: true,
            include_plugin_provider_names: true,
        }
    }
}

impl CompileOptions {
    /// Options from resolved compiler settings
    pub fn from_config(settings: &CompilerSettings) -> BuildResult<Self> {
        let host_arch = match &settings.host_arch {
            Some(tag) => Arch::parse(tag)?,
            None => Arch::host(),
        };

        Ok(Self {
            host_arch,
            include_cordova_unibuild: settings.include_cordova_unibuild,
            parallel: settings.parallel,
            lint: settings.lint,
            include_plugin_provider_names: settings.include_plugin_provider_names,
        })
    }

    pub fn with_host_arch(mut self, host_arch: Arch) -> Self {
        self.host_arch = host_arch;
        self
    }

    pub fn with_cordova(mut self) -> Self {
        self.include_cordova_unibuild = true;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

/// A package ready to be compiled
#[derive(Debug, Clone)]
pub struct PackageSource {
    pub descriptor: PackageDescriptor,
    /// Plugins this package provides, already built
    pub plugins: Vec<SourceProcessor>,
    /// Files whose change could change `plugins`
    pub plugin_watch_set: WatchSet,
    /// Observations made while loading the package
    pub watch_set: WatchSet,
    pub native: Option<NativeDependencies>,
}

impl PackageSource {
    pub fn new(descriptor: PackageDescriptor) -> Self {
        Self {
            descriptor,
            plugins: Vec::new(),
            plugin_watch_set: WatchSet::new(),
            watch_set: WatchSet::new(),
            native: None,
        }
    }

    /// Load and validate `package.toml` from a package directory
    ///
    /// The manifest is recorded in the package watch-set. Packages declaring
    /// native dependencies expect them under `NATIVE_MODULES_DIR`.
    pub fn load(dir: &Path, reader: &dyn FileReader) -> BuildResult<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let mut watch_set = WatchSet::new();
        let bytes = read_and_watch_file(&mut watch_set, reader, &manifest_path).ok_or_else(|| {
            BuildError::io(
                &manifest_path,
                io::Error::new(io::ErrorKind::NotFound, "package manifest not found"),
            )
        })?;
        let content = String::from_utf8(bytes).map_err(|e| {
            BuildError::io(&manifest_path, io::Error::new(io::ErrorKind::InvalidData, e))
        })?;

        let manifest = PackageManifest::from_str(&content).map_err(PackageError::from)?;
        let descriptor = manifest.into_descriptor(dir)?;
        Validator::validate(&descriptor).map_err(PackageError::Validation)?;

        let native = (!descriptor.native_dependencies.is_empty())
            .then(|| NativeDependencies::new(dir.join(NATIVE_MODULES_DIR)));

        Ok(Self {
            watch_set,
            native,
            ..Self::new(descriptor)
        })
    }

    pub fn with_plugin(mut self, plugin: impl Into<SourceProcessor>) -> Self {
        self.plugins.push(plugin.into());
        self
    }

    pub fn with_plugin_watch_set(mut self, watch_set: WatchSet) -> Self {
        self.plugin_watch_set = watch_set;
        self
    }

    pub fn with_native(mut self, native: NativeDependencies) -> Self {
        self.native = Some(native);
        self
    }

    /// The source lister for one architecture
    pub fn lister<'r>(
        &self,
        source_arch: &ArchDescriptor,
        reader: &'r dyn FileReader,
    ) -> Box<dyn SourceLister + 'r> {
        match &source_arch.sources {
            Some(items) => Box::new(DeclaredSources::new(items.clone())),
            None => Box::new(DirectoryLister::new(
                self.descriptor.source_root.clone(),
                source_arch.arch.clone(),
                reader,
            )),
        }
    }
}

/// The output of compiling one package
#[derive(Debug, Clone)]
pub struct CompiledPackage {
    /// Package name; `None` for the app
    pub name: Option<String>,
    pub version: Option<semver::Version>,
    pub debug_only: bool,
    pub is_test: bool,
    pub unibuilds: Vec<Unibuild>,
    pub plugin_watch_set: WatchSet,
    /// Packages that provided plugins; `None` unless requested
    pub plugin_provider_package_names: Option<BTreeSet<String>>,
}

impl CompiledPackage {
    /// The unibuild for an exact architecture
    pub fn unibuild(&self, arch: &Arch) -> Option<&Unibuild> {
        self.unibuilds.iter().find(|u| &u.arch == arch)
    }

    /// Turn into a cache entry usable by later compilations
    pub fn into_built_package(self, plugins: Vec<SourceProcessor>) -> BuiltPackage {
        BuiltPackage {
            name: self.name.unwrap_or_default(),
            debug_only: self.debug_only,
            plugins,
            plugin_watch_set: self.plugin_watch_set,
            unibuilds: self.unibuilds,
        }
    }
}

struct UnibuildOutput {
    unibuild: Unibuild,
    provider_names: BTreeSet<String>,
    diagnostics: Diagnostics,
}

/// Compiles packages against a cache of already-built dependencies
pub struct PackageCompiler<'a> {
    cache: &'a dyn PackageCache,
    reader: &'a dyn FileReader,
    options: CompileOptions,
}

impl<'a> PackageCompiler<'a> {
    pub fn new(cache: &'a dyn PackageCache) -> Self {
        Self {
            cache,
            reader: &FS_READER,
            options: CompileOptions::default(),
        }
    }

    pub fn with_reader(mut self, reader: &'a dyn FileReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Architectures of `source` this compiler builds
    fn architectures<'s>(&self, source: &'s PackageSource) -> Vec<&'s ArchDescriptor> {
        source
            .descriptor
            .architectures
            .iter()
            .filter(|a| self.options.include_cordova_unibuild || !a.arch.is_cordova())
            .collect()
    }

    /// Compile every architecture of a package
    ///
    /// Recoverable problems go to `diags`, merged in declaration order. A
    /// fatal error aborts the package.
    pub fn compile(
        &self,
        source: &PackageSource,
        diags: &mut Diagnostics,
    ) -> BuildResult<CompiledPackage> {
        let start = Instant::now();
        let architectures = self.architectures(source);
        info!(
            package = source.descriptor.display_name(),
            arches = architectures.len(),
            "compiling package"
        );

        let outputs: Vec<BuildResult<UnibuildOutput>> = if self.options.parallel {
            architectures
                .par_iter()
                .map(|source_arch| self.compile_unibuild(source, source_arch))
                .collect()
        } else {
            architectures
                .iter()
                .map(|source_arch| self.compile_unibuild(source, source_arch))
                .collect()
        };

        let mut unibuilds = Vec::with_capacity(outputs.len());
        let mut provider_names = BTreeSet::new();
        for output in outputs {
            let output = output?;
            diags.merge(output.diagnostics);
            provider_names.extend(output.provider_names);
            unibuilds.push(output.unibuild);
        }

        info!(
            package = source.descriptor.display_name(),
            unibuilds = unibuilds.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "compiled package"
        );

        Ok(CompiledPackage {
            name: source.descriptor.name.clone(),
            version: source.descriptor.version.clone(),
            debug_only: source.descriptor.debug_only,
            is_test: source.descriptor.is_test,
            unibuilds,
            plugin_watch_set: source.plugin_watch_set.clone(),
            plugin_provider_package_names: self
                .options
                .include_plugin_provider_names
                .then_some(provider_names),
        })
    }

    fn compile_unibuild(
        &self,
        source: &PackageSource,
        source_arch: &ArchDescriptor,
    ) -> BuildResult<UnibuildOutput> {
        let mut diags = Diagnostics::new();
        let mut watch_set = source.watch_set.clone();

        // Plugins run on the host, so resolve them there
        let scope = PluginScope::resolve(source, &source_arch.uses, self.cache, &self.options.host_arch);
        for used in &scope.used {
            watch_set.merge(&used.package.plugin_watch_set);
        }

        let registry = PluginRegistry::build(
            &scope.active,
            &source_arch.arch,
            source.descriptor.display_name(),
            &mut diags,
        );

        let (items, listing_watch_set) = source
            .lister(source_arch, self.reader)
            .list(registry.source_extensions())?;
        watch_set.merge(&listing_watch_set);

        if let Some(native) = &source.native {
            read_and_watch_file(&mut watch_set, self.reader, &native.lockfile_path());
        }

        let classifier = Classifier {
            descriptor: &source.descriptor,
            arch: &source_arch.arch,
            registry: &registry,
            reader: self.reader,
        };
        let resources = classifier.classify(&items, &mut watch_set, &mut diags);

        let unibuild = assemble_unibuild(
            source.descriptor.key(),
            source_arch,
            resources,
            watch_set,
            source.native.as_ref(),
            &self.options.host_arch,
        );
        debug!(
            package = source.descriptor.display_name(),
            arch = %unibuild.arch,
            resources = unibuild.resources.len(),
            "compiled unibuild"
        );

        Ok(UnibuildOutput {
            unibuild,
            provider_names: scope.provider_names(),
            diagnostics: diags,
        })
    }

    /// Run linters over every architecture of a package
    pub fn lint(&self, source: &PackageSource, diags: &mut Diagnostics) -> BuildResult<()> {
        if !self.options.lint {
            return Ok(());
        }

        info!(package = source.descriptor.display_name(), "linting package");
        for source_arch in self.architectures(source) {
            lint_unibuild(
                source,
                source_arch,
                self.cache,
                self.reader,
                &self.options.host_arch,
                diags,
            )?;
        }
        Ok(())
    }

    /// Minifiers visible to a package
    pub fn collect_minifiers(
        &self,
        source: &PackageSource,
        diags: &mut Diagnostics,
    ) -> Vec<MinifierPlugin> {
        minify::collect_minifiers(source, self.cache, &self.options, diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isle_package::{PackageUse, SourceItem};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_options_from_settings() {
        let settings = CompilerSettings {
            host_arch: Some("os.linux.arm64".to_string()),
            parallel: false,
            ..CompilerSettings::default()
        };
        let options = CompileOptions::from_config(&settings).unwrap();
        assert_eq!(options.host_arch.as_str(), "os.linux.arm64");
        assert!(!options.parallel);

        let bad = CompilerSettings {
            host_arch: Some("mainframe".to_string()),
            ..CompilerSettings::default()
        };
        assert!(matches!(
            CompileOptions::from_config(&bad),
            Err(BuildError::Architecture(_))
        ));
    }

    #[test]
    fn test_load_watches_manifest() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(MANIFEST_FILE),
            "[package]\nname = \"less\"\narchitectures = [\"client\"]\n",
        )
        .unwrap();

        let source = PackageSource::load(temp_dir.path(), &FsReader).unwrap();
        assert_eq!(source.descriptor.name.as_deref(), Some("less"));
        assert!(source.watch_set.contains(&temp_dir.path().join(MANIFEST_FILE)));
        assert!(source.native.is_none());
        assert!(matches!(
            PackageSource::load(&temp_dir.path().join("missing"), &FsReader),
            Err(BuildError::IoError { .. })
        ));
    }

    #[test]
    fn test_cordova_skipped_unless_requested() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.js"), "1").unwrap();
        let descriptor = PackageDescriptor::new("p", temp_dir.path())
            .with_arch(ArchDescriptor::new(Arch::web_browser()).with_source(SourceItem::new("a.js")))
            .with_arch(ArchDescriptor::new(Arch::web_cordova()).with_source(SourceItem::new("a.js")));
        let source = PackageSource::new(descriptor);
        let cache = crate::cache::MemoryPackageCache::new();

        let compiler = PackageCompiler::new(&cache);
        let compiled = compiler.compile(&source, &mut Diagnostics::new()).unwrap();
        assert_eq!(compiled.unibuilds.len(), 1);

        let compiler = PackageCompiler::new(&cache)
            .with_options(CompileOptions::default().with_cordova().sequential());
        let compiled = compiler.compile(&source, &mut Diagnostics::new()).unwrap();
        assert_eq!(compiled.unibuilds.len(), 2);
        assert!(compiled.unibuild(&Arch::web_cordova()).is_some());
    }

    #[test]
    fn test_lockfile_watched_with_native_dependencies() {
        let temp_dir = TempDir::new().unwrap();
        let npm_dir = temp_dir.path().join(".npm");
        fs::create_dir_all(npm_dir.join("node_modules")).unwrap();
        fs::write(npm_dir.join("npm-shrinkwrap.json"), "{}").unwrap();

        let descriptor = PackageDescriptor::new("p", temp_dir.path()).with_arch(
            ArchDescriptor::new(Arch::os())
                .with_use(PackageUse::new("missing"))
                .with_source(SourceItem::new("server.js")),
        );
        let source =
            PackageSource::new(descriptor).with_native(NativeDependencies::new(npm_dir.join("node_modules")));
        let cache = crate::cache::MemoryPackageCache::new();

        let mut diags = Diagnostics::new();
        let compiled = PackageCompiler::new(&cache).compile(&source, &mut diags).unwrap();

        let unibuild = &compiled.unibuilds[0];
        assert!(unibuild.watch_set.file_hash(&npm_dir.join("npm-shrinkwrap.json")).is_some());
        assert_eq!(unibuild.node_modules_path, Some(npm_dir.join("node_modules")));
        // server.js was never written
        assert_eq!(diags.error_count(), 1);
    }
}
