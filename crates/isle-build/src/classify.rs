//! Source classification and routing
//!
//! Every listed source file is classified exactly once: deferred to a
//! compiler plugin (or native compilation), handed to a legacy handler, kept
//! as a static asset, or skipped because its compiler plugin does not apply
//! to this architecture.

use crate::compile_step::CompileStep;
use crate::diagnostics::{panic_message, Diagnostic, DiagnosticKind, Diagnostics};
use crate::fingerprint::{resolve_rel_path, FileRead, FileReader};
use crate::plugin::LegacyHandler;
use crate::registry::{PluginRegistry, Route};
use crate::unibuild::Resource;
use crate::watch::{read_and_watch_file_with_hash, WatchSet};
use isle_package::{Arch, PackageDescriptor, SourceItem};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use tracing::{debug, warn};

/// What classification of one architecture needs
#[derive(Clone, Copy)]
pub struct Classifier<'a> {
    pub descriptor: &'a PackageDescriptor,
    pub arch: &'a Arch,
    pub registry: &'a PluginRegistry,
    pub reader: &'a dyn FileReader,
}

impl<'a> Classifier<'a> {
    /// Classify `items`, merging the watch data of every relevant file
    ///
    /// Files skipped for architecture irrelevance are not watched. Missing
    /// files are reported and still watched so that creating them triggers a
    /// rebuild.
    pub fn classify(
        &self,
        items: &[SourceItem],
        watch_set: &mut WatchSet,
        diags: &mut Diagnostics,
    ) -> Vec<Resource> {
        let mut resources = Vec::new();

        for item in items {
            let full_path = resolve_rel_path(&self.descriptor.source_root, &item.rel_path);
            let mut file_watch_set = WatchSet::new();
            let Some(file) =
                read_and_watch_file_with_hash(&mut file_watch_set, self.reader, &full_path)
            else {
                diags.error_at(
                    DiagnosticKind::MissingSource,
                    format!("File not found: {}", item.rel_path),
                    &item.rel_path,
                );
                watch_set.merge(&file_watch_set);
                continue;
            };

            let route = if item.options.is_asset {
                Route::Asset
            } else {
                self.registry.route(item.file_name(), self.arch)
            };

            if let Route::Ignored = route {
                debug!(path = %item.rel_path, arch = %self.arch, "skipping file for irrelevant plugin");
                continue;
            }
            watch_set.merge(&file_watch_set);

            match route {
                Route::Deferred(extension) => resources.push(Resource::Source {
                    extension: extension.to_string(),
                    path: item.rel_path.clone(),
                    data: file.contents,
                    hash: file.hash,
                    file_options: item.options.clone(),
                }),
                Route::Legacy(handler) => {
                    let outputs = self.run_handler(handler, item, full_path, &file, diags);
                    resources.extend(outputs);
                }
                Route::Asset => resources.push(Resource::asset(
                    self.descriptor,
                    &item.rel_path,
                    file.contents,
                    file.hash,
                )),
                Route::Ignored => {}
            }
        }

        resources
    }

    /// Invoke a legacy handler inside a fault boundary
    ///
    /// An `Err` or a panic drops the file's outputs and is reported against
    /// its path.
    fn run_handler(
        &self,
        handler: &LegacyHandler,
        item: &SourceItem,
        full_path: PathBuf,
        file: &FileRead,
        diags: &mut Diagnostics,
    ) -> Vec<Resource> {
        let mut step = CompileStep::new(
            self.descriptor,
            self.arch,
            &item.rel_path,
            full_path,
            &file.contents,
            &file.hash,
            &item.options,
        );

        let outcome = catch_unwind(AssertUnwindSafe(|| (handler.handler)(&mut step)));
        let (resources, step_errors) = step.into_parts();

        for error in step_errors {
            let mut diagnostic = Diagnostic::error(DiagnosticKind::HandlerFailed, error.message)
                .with_path(&item.rel_path);
            if let Some(line) = error.line {
                diagnostic = diagnostic.with_line(line);
            }
            diags.push(diagnostic);
        }

        let failure = match outcome {
            Ok(Ok(())) => return resources,
            Ok(Err(message)) => message,
            Err(payload) => panic_message(payload.as_ref()),
        };

        warn!(package = %handler.package, path = %item.rel_path, "legacy handler failed");
        diags.error_at(
            DiagnosticKind::HandlerFailed,
            format!("{} (compiling {})", failure, item.rel_path),
            &item.rel_path,
        );
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{hash_bytes, FsReader};
    use crate::plugin::{CompilerPlugin, SourceProcessor};
    use crate::registry::ActivePlugins;
    use crate::unibuild::CompiledKind;
    use std::fs;
    use tempfile::TempDir;

    fn registry(plugins: &[SourceProcessor], arch: &Arch) -> PluginRegistry {
        let active = [ActivePlugins {
            package: "plugins",
            plugins,
        }];
        PluginRegistry::build(&active, arch, "p", &mut Diagnostics::new())
    }

    fn fixture(files: &[(&str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for (rel, contents) in files {
            let path = temp_dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        temp_dir
    }

    #[test]
    fn test_handler_outputs_committed() {
        let temp_dir = fixture(&[("a.coffee", "x = 1")]);
        let descriptor = PackageDescriptor::new("p", temp_dir.path());
        let plugins: Vec<SourceProcessor> = vec![LegacyHandler::new("coffee", "coffee", |step| {
            let js = format!("var {};", step.contents_as_string());
            let path = format!("{}.js", step.input_path());
            step.add_javascript(path, js);
            Ok(())
        })
        .into()];
        let arch = Arch::os();
        let registry = registry(&plugins, &arch);
        let classifier = Classifier {
            descriptor: &descriptor,
            arch: &arch,
            registry: &registry,
            reader: &FsReader,
        };

        let mut watch_set = WatchSet::new();
        let mut diags = Diagnostics::new();
        let resources = classifier.classify(&[SourceItem::new("a.coffee")], &mut watch_set, &mut diags);

        assert!(diags.is_empty());
        assert_eq!(
            resources,
            vec![Resource::Compiled {
                kind: CompiledKind::Js,
                path: "a.coffee.js".to_string(),
                data: b"var x = 1;".to_vec(),
                source_path: "a.coffee".to_string(),
            }]
        );
        assert_eq!(
            watch_set.file_hash(&temp_dir.path().join("a.coffee")),
            Some(hash_bytes(b"x = 1").as_str())
        );
    }

    #[test]
    fn test_failing_handlers_isolated() {
        let temp_dir = fixture(&[("a.bad", ""), ("b.boom", ""), ("c.js", "ok")]);
        let descriptor = PackageDescriptor::new("p", temp_dir.path());
        let plugins: Vec<SourceProcessor> = vec![
            LegacyHandler::new("bad", "bad", |step| {
                step.add_javascript("ignored.js", "");
                Err("syntax error".to_string())
            })
            .into(),
            LegacyHandler::new("boom", "boom", |_| panic!("handler exploded")).into(),
        ];
        let arch = Arch::os();
        let registry = registry(&plugins, &arch);
        let classifier = Classifier {
            descriptor: &descriptor,
            arch: &arch,
            registry: &registry,
            reader: &FsReader,
        };

        let items = [SourceItem::new("a.bad"), SourceItem::new("b.boom"), SourceItem::new("c.js")];
        let mut diags = Diagnostics::new();
        let resources = classifier.classify(&items, &mut WatchSet::new(), &mut diags);

        let messages: Vec<_> = diags
            .of_kind(DiagnosticKind::HandlerFailed)
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec!["syntax error (compiling a.bad)", "handler exploded (compiling b.boom)"]
        );
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].path(), "c.js");
    }

    #[test]
    fn test_as_asset_option_bypasses_routing() {
        let temp_dir = fixture(&[("public/app.js", "asset")]);
        let descriptor = PackageDescriptor::app(temp_dir.path());
        let plugins: Vec<SourceProcessor> =
            vec![CompilerPlugin::new("less", "less", ["less"]).into()];
        let arch = Arch::web_browser();
        let registry = registry(&plugins, &arch);
        let classifier = Classifier {
            descriptor: &descriptor,
            arch: &arch,
            registry: &registry,
            reader: &FsReader,
        };

        let resources = classifier.classify(
            &[SourceItem::asset("public/app.js")],
            &mut WatchSet::new(),
            &mut Diagnostics::new(),
        );
        assert!(matches!(
            &resources[..],
            [Resource::Asset { serve_path, .. }] if serve_path == "/app.js"
        ));
    }
}
