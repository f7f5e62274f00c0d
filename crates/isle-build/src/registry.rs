//! Extension registry
//!
//! Maps each file extension to the plugin responsible for it, built from the
//! active plugin packages of one architecture. Registration completes before
//! any file is classified against the registry.

use crate::cache::PackageCache;
use crate::compiler::PackageSource;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::plugin::{CompilerPlugin, LegacyHandler, SourceProcessor};
use crate::walker::{walk_used_unibuilds, UsedUnibuild, WalkPolicy};
use isle_package::{Arch, PackageUse};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// The extension compiled natively; no plugin may claim it
pub const NATIVE_SOURCE_EXTENSION: &str = "js";

/// Extensions of interest to a source lister, mapped to whether they are templates
pub type SourceExtensions = BTreeMap<String, bool>;

/// Dotted suffixes of a file name, longest first
///
/// `a.spec.js` yields `spec.js` then `js`. A leading dot does not start a
/// suffix, so `.gitignore` yields nothing.
pub fn dotted_suffixes(file_name: &str) -> impl Iterator<Item = &str> {
    file_name
        .char_indices()
        .skip(1)
        .filter(|&(_, c)| c == '.')
        .map(move |(i, _)| &file_name[i + 1..])
        .filter(|suffix| !suffix.is_empty())
}

/// Plugins provided by one active package
#[derive(Debug, Clone, Copy)]
pub struct ActivePlugins<'a> {
    /// Name used in messages
    pub package: &'a str,
    pub plugins: &'a [SourceProcessor],
}

/// Packages whose plugins apply to one architecture of a compilation
#[derive(Debug)]
pub struct PluginScope<'a> {
    /// The compiling package first, then every reached package with plugins
    pub active: Vec<ActivePlugins<'a>>,
    /// Everything reached by the walk, excluding the compiling package
    pub used: Vec<UsedUnibuild<'a>>,
    own_name: &'a str,
}

impl<'a> PluginScope<'a> {
    /// Walk `uses` at the host architecture, where plugins run
    pub fn resolve(
        source: &'a PackageSource,
        uses: &[PackageUse],
        cache: &'a dyn PackageCache,
        host_arch: &Arch,
    ) -> Self {
        let own_name = source.descriptor.key();
        let used: Vec<UsedUnibuild<'a>> =
            walk_used_unibuilds(cache, uses, host_arch, &WalkPolicy::plugins())
                .into_iter()
                .filter(|u| u.package.name != own_name)
                .collect();

        let mut active = vec![ActivePlugins {
            package: source.descriptor.display_name(),
            plugins: &source.plugins,
        }];
        let mut seen = BTreeSet::new();
        for used_unibuild in &used {
            let package = used_unibuild.package;
            if package.has_plugins() && seen.insert(package.name.as_str()) {
                active.push(ActivePlugins {
                    package: &package.name,
                    plugins: &package.plugins,
                });
            }
        }

        Self {
            active,
            used,
            own_name,
        }
    }

    /// The compiling package plus every package the walk reached
    pub fn provider_names(&self) -> BTreeSet<String> {
        std::iter::once(self.own_name.to_string())
            .chain(self.used.iter().map(|u| u.package.name.clone()))
            .collect()
    }

    /// Every plugin of the active packages, in registration order
    pub fn plugins(&self) -> impl Iterator<Item = (&'a str, &'a SourceProcessor)> + '_ {
        self.active
            .iter()
            .flat_map(|a| a.plugins.iter().map(move |p| (a.package, p)))
    }
}

/// How a file is routed by the registry
#[derive(Debug, Clone, Copy)]
pub enum Route<'r> {
    /// Native source or a relevant compiler plugin; compiled later
    Deferred(&'r str),
    /// Claimed by a compiler plugin not relevant to this architecture
    Ignored,
    /// Handled now by a legacy handler
    Legacy(&'r LegacyHandler),
    /// Nobody claims it
    Asset,
}

/// Extension ownership for one architecture
#[derive(Debug, Default)]
pub struct PluginRegistry {
    /// Extension -> package that claimed it first
    claims: BTreeMap<String, String>,
    legacy: BTreeMap<String, LegacyHandler>,
    compilers: BTreeMap<String, CompilerPlugin>,
    source_extensions: SourceExtensions,
}

impl PluginRegistry {
    /// Register every legacy handler and compiler plugin of `active`
    ///
    /// Two claims on one extension are a conflict: the first claimant keeps
    /// it and an error naming both packages is reported.
    pub fn build(
        active: &[ActivePlugins<'_>],
        arch: &Arch,
        target: &str,
        diags: &mut Diagnostics,
    ) -> Self {
        let mut registry = Self::default();
        registry
            .source_extensions
            .insert(NATIVE_SOURCE_EXTENSION.to_string(), false);

        for package in active {
            let legacy = package.plugins.iter().filter_map(|p| match p {
                SourceProcessor::Legacy(handler) => Some(handler),
                _ => None,
            });
            for handler in legacy {
                // Handlers for other arches never register, so they cannot conflict
                if !handler.relevant_for_arch(arch) {
                    continue;
                }
                if !registry.claim(&handler.extension, package.package, target, diags) {
                    continue;
                }
                registry
                    .legacy
                    .insert(handler.extension.clone(), handler.clone());
                registry
                    .source_extensions
                    .insert(handler.extension.clone(), handler.is_template);
            }

            let compilers = package.plugins.iter().filter_map(|p| match p {
                SourceProcessor::Compiler(plugin) => Some(plugin),
                _ => None,
            });
            for plugin in compilers {
                for extension in &plugin.info.extensions {
                    if !registry.claim(extension, package.package, target, diags) {
                        continue;
                    }
                    // Recorded even when irrelevant so matching files are skipped
                    registry.compilers.insert(extension.clone(), plugin.clone());
                    if plugin.relevant_for_arch(arch) {
                        registry
                            .source_extensions
                            .insert(extension.clone(), plugin.info.is_template);
                    }
                }
            }
        }

        registry
    }

    fn claim(
        &mut self,
        extension: &str,
        package: &str,
        target: &str,
        diags: &mut Diagnostics,
    ) -> bool {
        if extension == NATIVE_SOURCE_EXTENSION {
            diags.warning(
                DiagnosticKind::IgnoredClaim,
                format!(
                    "{} tried to handle .{}, which is always compiled natively; ignoring",
                    package, extension
                ),
            );
            return false;
        }

        if let Some(first) = self.claims.get(extension) {
            warn!(extension, first = %first, second = package, target, "extension conflict");
            diags.error(
                DiagnosticKind::Conflict,
                format!(
                    "conflict: two packages included in {}, {} and {}, are both trying to handle .{}",
                    target, first, package, extension
                ),
            );
            return false;
        }

        self.claims
            .insert(extension.to_string(), package.to_string());
        true
    }

    /// Extensions a source lister should look for
    pub fn source_extensions(&self) -> &SourceExtensions {
        &self.source_extensions
    }

    /// The package that owns an extension
    pub fn claimant(&self, extension: &str) -> Option<&str> {
        self.claims.get(extension).map(String::as_str)
    }

    pub fn compiler(&self, extension: &str) -> Option<&CompilerPlugin> {
        self.compilers.get(extension)
    }

    pub fn legacy_handler(&self, extension: &str) -> Option<&LegacyHandler> {
        self.legacy.get(extension)
    }

    /// Route a file by its longest claimed dotted suffix
    pub fn route<'r>(&'r self, file_name: &'r str, arch: &Arch) -> Route<'r> {
        for extension in dotted_suffixes(file_name) {
            if extension == NATIVE_SOURCE_EXTENSION {
                return Route::Deferred(extension);
            }
            if let Some(plugin) = self.compilers.get(extension) {
                if !plugin.relevant_for_arch(arch) {
                    return Route::Ignored;
                }
                return Route::Deferred(extension);
            }
            if let Some(handler) = self.legacy.get(extension) {
                return Route::Legacy(handler);
            }
        }
        Route::Asset
    }
}
