//! Minifier discovery

use crate::cache::PackageCache;
use crate::compiler::{CompileOptions, PackageSource};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::plugin::{MinifierPlugin, SourceProcessor};
use crate::registry::PluginScope;
use std::collections::HashSet;
use tracing::warn;

/// Output types a minifier can claim
pub const MINIFIED_TYPES: [&str; 2] = ["js", "css"];

/// Every minifier visible to any architecture of `source`
///
/// Each output type may be claimed by at most one minifier; extra claimants
/// are reported as a single conflict listing all of them.
pub fn collect_minifiers(
    source: &PackageSource,
    cache: &dyn PackageCache,
    options: &CompileOptions,
    diags: &mut Diagnostics,
) -> Vec<MinifierPlugin> {
    let mut minifiers: Vec<MinifierPlugin> = Vec::new();
    let mut seen = HashSet::new();

    for source_arch in &source.descriptor.architectures {
        let scope = PluginScope::resolve(source, &source_arch.uses, cache, &options.host_arch);
        for (_, plugin) in scope.plugins() {
            if let SourceProcessor::Minifier(minifier) = plugin {
                if seen.insert(minifier.info.id()) {
                    minifiers.push(minifier.clone());
                }
            }
        }
    }

    for output_type in MINIFIED_TYPES {
        let packages: Vec<&str> = minifiers
            .iter()
            .filter(|m| m.info.extensions.iter().any(|e| e == output_type))
            .map(|m| m.info.package.as_str())
            .collect();
        if packages.len() > 1 {
            warn!(output_type, claimants = packages.len(), "minifier conflict");
            diags.error(
                DiagnosticKind::Conflict,
                format!(
                    "{}: multiple packages registered minifiers for extension \"{}\".",
                    packages.join(", "),
                    output_type
                ),
            );
        }
    }

    minifiers
}
