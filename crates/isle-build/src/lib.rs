//! Isle package compilation core
//!
//! Turns a package's source tree into per-architecture unibuilds:
//! - Walking the transitive uses of a package against built packages
//! - Resolving active plugins and the extensions they claim
//! - Listing and classifying source files
//! - Running legacy source handlers and linters in isolation
//! - Watch-sets recording every input a build depended on
//! - Unibuild assembly with native module narrowing

pub mod cache;
pub mod classify;
pub mod compile_step;
pub mod compiler;
pub mod diagnostics;
pub mod error;
pub mod fingerprint;
pub mod lint;
pub mod minify;
pub mod plugin;
pub mod registry;
pub mod sources;
pub mod unibuild;
pub mod walker;
pub mod watch;

// Re-export main types
pub use cache::{BuiltPackage, MemoryPackageCache, PackageCache};
pub use classify::Classifier;
pub use compile_step::{CompileStep, HtmlSection, StepError};
pub use compiler::{CompileOptions, CompiledPackage, PackageCompiler, PackageSource};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{BuildError, BuildResult};
pub use fingerprint::{hash_bytes, FileRead, FileReader, FsReader};
pub use lint::{lint_globals, run_linters};
pub use minify::collect_minifiers;
pub use plugin::{
    CompilerPlugin, LegacyHandler, LintMessage, LintOptions, Linter, LinterPlugin, LintingFile,
    MinifierPlugin, PluginId, PluginInfo, SourceProcessor,
};
pub use registry::{ActivePlugins, PluginRegistry, PluginScope, Route, SourceExtensions};
pub use sources::{sort_load_order, DeclaredSources, DirectoryLister, SourceLister};
pub use unibuild::{
    assemble_unibuild, CompiledKind, NativeDependencies, Resource, Unibuild, UnibuildId,
};
pub use walker::{walk_used_unibuilds, UsedUnibuild, WalkPolicy};
pub use watch::{read_and_watch_file, DirectoryObservation, WatchSet};

// Re-export isle-package types for convenience
pub use isle_package::{Arch, ArchDescriptor, PackageDescriptor, PackageUse, SourceItem};
