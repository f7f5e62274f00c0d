//! Linter orchestration
//!
//! Linters never produce unibuild content; they only report. Each linter
//! relevant to an architecture is invoked once with every file whose longest
//! linted extension it claims, together with the globals the linted code can
//! see.

use crate::cache::PackageCache;
use crate::compiler::PackageSource;
use crate::diagnostics::{panic_message, Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::BuildResult;
use crate::fingerprint::{resolve_rel_path, FileReader};
use crate::plugin::{LintOptions, LinterPlugin, LintingFile, SourceProcessor};
use crate::registry::{dotted_suffixes, PluginScope, SourceExtensions};
use crate::walker::{walk_used_unibuilds, WalkPolicy};
use isle_package::{Arch, ArchDescriptor};
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{info, warn};

/// Globals every linted file can see
pub const BASE_GLOBALS: [&str; 1] = ["Package"];

/// Globals added on server architectures
pub const SERVER_GLOBALS: [&str; 2] = ["Npm", "Assets"];

/// Symbols visible to linted code of one architecture
///
/// Dependencies are resolved at the architecture plugins actually build for:
/// the generic `os` falls back to the concrete host.
pub fn lint_globals(
    source: &PackageSource,
    source_arch: &ArchDescriptor,
    cache: &dyn PackageCache,
    host_arch: &Arch,
) -> Vec<String> {
    let mut globals: Vec<String> = BASE_GLOBALS.iter().map(|g| g.to_string()).collect();
    if source_arch.arch.is_server() {
        globals.extend(SERVER_GLOBALS.iter().map(|g| g.to_string()));
    }

    let which_arch = if source_arch.arch.is_generic_server() {
        host_arch
    } else {
        &source_arch.arch
    };

    let own_name = source.descriptor.key();
    for used in walk_used_unibuilds(cache, &source_arch.uses, which_arch, &WalkPolicy::lint()) {
        if used.package.name == own_name {
            continue;
        }
        for export in &used.unibuild.declared_exports {
            if (!export.test_only || source.descriptor.is_test) && !globals.contains(&export.name) {
                globals.push(export.name.clone());
            }
        }
    }

    globals
}

/// The longest dotted suffix of `file_name` that is in `claimed`
pub fn longest_linted_extension<'f>(
    file_name: &'f str,
    claimed: &BTreeSet<&str>,
) -> Option<&'f str> {
    dotted_suffixes(file_name).find(|ext| claimed.contains(ext))
}

/// Lint one architecture of a package
pub fn lint_unibuild(
    source: &PackageSource,
    source_arch: &ArchDescriptor,
    cache: &dyn PackageCache,
    reader: &dyn FileReader,
    host_arch: &Arch,
    diags: &mut Diagnostics,
) -> BuildResult<()> {
    let scope = PluginScope::resolve(source, &source_arch.uses, cache, host_arch);
    let linters: Vec<&LinterPlugin> = scope
        .plugins()
        .filter_map(|(_, plugin)| match plugin {
            SourceProcessor::Linter(linter) => Some(linter),
            _ => None,
        })
        .collect();

    if linters.is_empty() {
        return Ok(());
    }

    let mut extensions = SourceExtensions::new();
    for linter in &linters {
        for extension in &linter.info.extensions {
            extensions.insert(extension.clone(), linter.info.is_template);
        }
    }

    let (items, _) = source.lister(source_arch, reader).list(&extensions)?;
    // Unreadable files are reported by compilation, not by lint
    let files: Vec<LintingFile> = items
        .iter()
        .filter_map(|item| {
            let full_path = resolve_rel_path(&source.descriptor.source_root, &item.rel_path);
            let read = reader.read_and_hash(&full_path)?;
            Some(LintingFile {
                rel_path: item.rel_path.clone(),
                contents: read.contents,
                package: source.descriptor.key().to_string(),
                hash: read.hash,
                arch: source_arch.arch.clone(),
            })
        })
        .collect();

    let globals = lint_globals(source, source_arch, cache, host_arch);
    let target = source.descriptor.name.as_deref().unwrap_or("app");
    run_linters(target, &source_arch.arch, &linters, &files, globals, diags);
    Ok(())
}

/// Invoke each relevant linter once with the files it owns
pub fn run_linters(
    target: &str,
    arch: &Arch,
    linters: &[&LinterPlugin],
    files: &[LintingFile],
    globals: Vec<String>,
    diags: &mut Diagnostics,
) {
    let claimed: BTreeSet<&str> = linters
        .iter()
        .flat_map(|l| l.info.extensions.iter().map(String::as_str))
        .collect();
    let longest: Vec<Option<&str>> = files
        .iter()
        .map(|f| longest_linted_extension(file_name(&f.rel_path), &claimed))
        .collect();
    let options = LintOptions { globals };

    for linter in linters {
        if !linter.relevant_for_arch(arch) {
            continue;
        }

        let owns = |ext: &str| linter.info.extensions.iter().any(|e| e == ext);
        let to_lint: Vec<LintingFile> = files
            .iter()
            .zip(&longest)
            .filter(|(_, ext)| ext.map_or(false, owns))
            .map(|(file, _)| file.clone())
            .collect();
        if to_lint.is_empty() {
            continue;
        }

        let title = format!(
            "linting files with {} for target: {} ({})",
            linter.info.package,
            target,
            arch.label()
        );
        info!(linter = %linter.info.package, files = to_lint.len(), arch = %arch, "running linter");

        diags.with_job(title, |diags| {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                linter.linter.process_files_for_target(&to_lint, &options)
            }));
            let failure = match outcome {
                Ok(Ok(messages)) => {
                    for message in messages {
                        let mut diagnostic =
                            Diagnostic::warning(DiagnosticKind::Lint, message.message)
                                .with_path(message.rel_path);
                        if let Some(line) = message.line {
                            diagnostic = diagnostic.with_line(line);
                        }
                        diags.push(diagnostic);
                    }
                    return;
                }
                Ok(Err(message)) => message,
                Err(payload) => panic_message(payload.as_ref()),
            };
            warn!(linter = %linter.info.package, "linter failed");
            diags.error(DiagnosticKind::LinterFailed, failure);
        });
    }
}

fn file_name(rel_path: &str) -> &str {
    rel_path.rsplit('/').next().unwrap_or(rel_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{BuiltPackage, MemoryPackageCache};
    use crate::plugin::LintMessage;
    use crate::unibuild::assemble_unibuild;
    use crate::watch::WatchSet;
    use isle_package::{Export, PackageDescriptor, PackageUse};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::{Arc, Mutex};

    fn file(rel_path: &str) -> LintingFile {
        LintingFile {
            rel_path: rel_path.to_string(),
            contents: Vec::new(),
            package: "p".to_string(),
            hash: String::new(),
            arch: Arch::web_browser(),
        }
    }

    type Calls = Arc<Mutex<Vec<(String, Vec<String>)>>>;

    fn recording(package: &str, extensions: &[&str], calls: &Calls) -> LinterPlugin {
        let calls = Arc::clone(calls);
        let name = package.to_string();
        LinterPlugin::new(
            package,
            "lint",
            extensions.iter().copied(),
            move |files: &[LintingFile], _: &LintOptions| -> Result<Vec<LintMessage>, String> {
                let paths = files.iter().map(|f| f.rel_path.clone()).collect();
                calls.lock().unwrap().push((name.clone(), paths));
                Ok(Vec::new())
            },
        )
    }

    fn exporting(name: &str, arch: Arch, exports: Vec<Export>) -> BuiltPackage {
        let mut source_arch = ArchDescriptor::new(arch);
        for export in exports {
            source_arch = source_arch.with_export(export);
        }
        let unibuild =
            assemble_unibuild(name, &source_arch, Vec::new(), WatchSet::new(), None, &Arch::os());
        BuiltPackage::new(name).with_unibuild(unibuild)
    }

    fn linux() -> Arch {
        Arch::parse("os.linux.x86_64").unwrap()
    }

    /// `fibers` only has a unibuild for the concrete host
    fn globals_cache() -> MemoryPackageCache {
        MemoryPackageCache::new()
            .with_package(exporting(
                "fibers",
                linux(),
                vec![Export::new("Fiber"), Export::test_only("FiberTest")],
            ))
            .with_package(exporting("devtools", Arch::os(), vec![Export::new("Debugger")]).debug_only())
            .with_package(exporting("session", Arch::web_browser(), vec![Export::new("Session")]))
    }

    fn linted(arch: Arch, uses: &[&str], is_test: bool) -> (PackageSource, ArchDescriptor) {
        let mut source_arch = ArchDescriptor::new(arch);
        for package in uses {
            source_arch = source_arch.with_use(PackageUse::new(*package));
        }
        let mut descriptor = PackageDescriptor::new("widgets", "/widgets").with_arch(source_arch.clone());
        descriptor.is_test = is_test;
        (PackageSource::new(descriptor), source_arch)
    }

    #[test]
    fn test_client_globals_are_base_plus_exports() {
        let (source, source_arch) = linted(Arch::web_browser(), &["session"], false);
        let globals = lint_globals(&source, &source_arch, &globals_cache(), &linux());
        assert_eq!(globals, vec!["Package", "Session"]);
    }

    #[test]
    fn test_generic_server_resolves_at_host() {
        let (source, source_arch) = linted(Arch::os(), &["fibers", "devtools"], false);
        let globals = lint_globals(&source, &source_arch, &globals_cache(), &linux());
        assert_eq!(globals, vec!["Package", "Npm", "Assets", "Fiber"]);
    }

    #[test]
    fn test_concrete_server_arch_not_replaced_by_host() {
        // Resolving at `os.osx.arm64` cannot reach the linux-only unibuild
        let (source, source_arch) = linted(Arch::parse("os.osx.arm64").unwrap(), &["fibers"], false);
        let globals = lint_globals(&source, &source_arch, &globals_cache(), &linux());
        assert_eq!(globals, vec!["Package", "Npm", "Assets"]);
    }

    #[rstest]
    #[case(false, vec!["Package", "Npm", "Assets", "Fiber"])]
    #[case(true, vec!["Package", "Npm", "Assets", "Fiber", "FiberTest"])]
    fn test_test_only_exports(#[case] is_test: bool, #[case] expected: Vec<&str>) {
        let (source, source_arch) = linted(Arch::os(), &["fibers"], is_test);
        let globals = lint_globals(&source, &source_arch, &globals_cache(), &linux());
        assert_eq!(globals, expected);
    }

    #[test]
    fn test_longest_linted_extension() {
        let claimed: BTreeSet<&str> = ["js", "test.js"].into_iter().collect();
        assert_eq!(longest_linted_extension("a.test.js", &claimed), Some("test.js"));
        assert_eq!(longest_linted_extension("a.js", &claimed), Some("js"));
        assert_eq!(longest_linted_extension("a.css", &claimed), None);
    }

    #[test]
    fn test_each_file_linted_once_by_longest_extension() {
        let calls = Calls::default();
        let js = recording("jshint", &["js"], &calls);
        let tests = recording("test-lint", &["test.js"], &calls);
        let files = [file("a.test.js"), file("lib/b.js"), file("c.css")];

        let mut diags = Diagnostics::new();
        run_linters("app", &Arch::web_browser(), &[&js, &tests], &files, Vec::new(), &mut diags);

        assert!(diags.is_empty());
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                ("jshint".to_string(), vec!["lib/b.js".to_string()]),
                ("test-lint".to_string(), vec!["a.test.js".to_string()]),
            ]
        );
    }

    #[test]
    fn test_irrelevant_or_idle_linters_not_invoked() {
        let calls = Calls::default();
        let server_only = recording("server-lint", &["js"], &calls).for_arches(["os"]);
        let css = recording("csslint", &["css"], &calls);

        let mut diags = Diagnostics::new();
        run_linters(
            "app",
            &Arch::web_browser(),
            &[&server_only, &css],
            &[file("a.js")],
            Vec::new(),
            &mut diags,
        );

        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_linter_failure_reported_under_job() {
        let failing = LinterPlugin::new(
            "jshint",
            "lint",
            ["js"],
            |_: &[LintingFile], _: &LintOptions| -> Result<Vec<LintMessage>, String> {
                Err("config is invalid".to_string())
            },
        );
        let reporting = LinterPlugin::new(
            "eslint",
            "lint",
            ["jsx"],
            |files: &[LintingFile], options: &LintOptions| -> Result<Vec<LintMessage>, String> {
                Ok(vec![LintMessage::new(
                    &files[0].rel_path,
                    format!("{} globals", options.globals.len()),
                )
                .at_line(2)])
            },
        );

        let mut diags = Diagnostics::new();
        run_linters(
            "less",
            &Arch::web_cordova(),
            &[&failing, &reporting],
            &[file("a.js"), file("b.jsx")],
            vec!["Package".to_string()],
            &mut diags,
        );

        let all: Vec<_> = diags.iter().collect();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, DiagnosticKind::LinterFailed);
        assert_eq!(all[0].message, "config is invalid");
        assert_eq!(
            all[0].job.as_deref(),
            Some("linting files with jshint for target: less (Cordova)")
        );
        assert_eq!(all[1].kind, DiagnosticKind::Lint);
        assert_eq!(all[1].message, "1 globals");
        assert_eq!(all[1].line, Some(2));
    }
}
