//! Source processors
//!
//! Plugins are a closed set of variants behind one capability surface
//! (`extensions`, `relevant_for_arch`, `is_template`). The code a plugin runs
//! is opaque to the compiler: legacy handlers are callables over a
//! `CompileStep`, linters implement `Linter`. Compiler plugins and minifiers
//! carry no code here because they run in the bundling stage.

use crate::compile_step::CompileStep;
use isle_package::Arch;
use std::fmt;
use std::sync::Arc;

/// Callable run for each file a legacy handler claims
pub type LegacyHandlerFn = Arc<dyn Fn(&mut CompileStep<'_>) -> Result<(), String> + Send + Sync>;

/// Stable identity of a plugin
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PluginId {
    pub package: String,
    pub name: String,
}

/// Whether an architecture matches any of `arch_matching`; empty matches all
fn relevant(arch_matching: &[String], arch: &Arch) -> bool {
    arch_matching.is_empty() || arch_matching.iter().any(|a| arch.matches(a))
}

/// A single-extension handler invoked synchronously during compilation
#[derive(Clone)]
pub struct LegacyHandler {
    pub package: String,
    pub extension: String,
    pub is_template: bool,
    /// Only register for architectures matching this tag
    pub arch_matching: Option<String>,
    pub handler: LegacyHandlerFn,
}

impl LegacyHandler {
    pub fn new<F>(package: impl Into<String>, extension: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut CompileStep<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            package: package.into(),
            extension: extension.into(),
            is_template: false,
            arch_matching: None,
            handler: Arc::new(handler),
        }
    }

    pub fn template(mut self) -> Self {
        self.is_template = true;
        self
    }

    pub fn for_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch_matching = Some(arch.into());
        self
    }

    pub fn relevant_for_arch(&self, arch: &Arch) -> bool {
        self.arch_matching
            .as_deref()
            .map_or(true, |matching| arch.matches(matching))
    }
}

impl fmt::Debug for LegacyHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyHandler")
            .field("package", &self.package)
            .field("extension", &self.extension)
            .field("is_template", &self.is_template)
            .field("arch_matching", &self.arch_matching)
            .finish_non_exhaustive()
    }
}

/// Fields shared by the multi-extension plugin variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub package: String,
    pub name: String,
    pub extensions: Vec<String>,
    /// Architectures this plugin applies to; empty means all
    pub arch_matching: Vec<String>,
    pub is_template: bool,
}

impl PluginInfo {
    pub fn new<I, S>(package: impl Into<String>, name: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            package: package.into(),
            name: name.into(),
            extensions: extensions.into_iter().map(Into::into).collect(),
            arch_matching: Vec::new(),
            is_template: false,
        }
    }

    pub fn id(&self) -> PluginId {
        PluginId {
            package: self.package.clone(),
            name: self.name.clone(),
        }
    }
}

/// A compiler plugin; its files are deferred to the bundling stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerPlugin {
    pub info: PluginInfo,
}

impl CompilerPlugin {
    pub fn new<I, S>(package: impl Into<String>, name: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            info: PluginInfo::new(package, name, extensions),
        }
    }

    pub fn for_arches<I, S>(mut self, arches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info.arch_matching = arches.into_iter().map(Into::into).collect();
        self
    }

    pub fn template(mut self) -> Self {
        self.info.is_template = true;
        self
    }

    pub fn relevant_for_arch(&self, arch: &Arch) -> bool {
        relevant(&self.info.arch_matching, arch)
    }
}

/// A file handed to a linter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintingFile {
    pub rel_path: String,
    pub contents: Vec<u8>,
    /// Package being linted; empty for the app
    pub package: String,
    pub hash: String,
    pub arch: Arch,
}

impl LintingFile {
    /// Contents as text, lossily decoded
    pub fn contents_as_string(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}

/// Options passed to every linter invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintOptions {
    /// Symbols visible to the linted code without a declaration
    pub globals: Vec<String>,
}

/// A problem reported by a linter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintMessage {
    pub rel_path: String,
    pub line: Option<u32>,
    pub message: String,
}

impl LintMessage {
    pub fn new(rel_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// Code run by a linter plugin, once per architecture
pub trait Linter: Send + Sync {
    fn process_files_for_target(
        &self,
        files: &[LintingFile],
        options: &LintOptions,
    ) -> Result<Vec<LintMessage>, String>;
}

impl<F> Linter for F
where
    F: Fn(&[LintingFile], &LintOptions) -> Result<Vec<LintMessage>, String> + Send + Sync,
{
    fn process_files_for_target(
        &self,
        files: &[LintingFile],
        options: &LintOptions,
    ) -> Result<Vec<LintMessage>, String> {
        self(files, options)
    }
}

/// A linter plugin
#[derive(Clone)]
pub struct LinterPlugin {
    pub info: PluginInfo,
    pub linter: Arc<dyn Linter>,
}

impl LinterPlugin {
    pub fn new<I, S, L>(
        package: impl Into<String>,
        name: impl Into<String>,
        extensions: I,
        linter: L,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        L: Linter + 'static,
    {
        Self {
            info: PluginInfo::new(package, name, extensions),
            linter: Arc::new(linter),
        }
    }

    pub fn for_arches<I, S>(mut self, arches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info.arch_matching = arches.into_iter().map(Into::into).collect();
        self
    }

    pub fn relevant_for_arch(&self, arch: &Arch) -> bool {
        relevant(&self.info.arch_matching, arch)
    }
}

impl fmt::Debug for LinterPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinterPlugin")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// A minifier plugin; at most one may claim each output type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinifierPlugin {
    pub info: PluginInfo,
}

impl MinifierPlugin {
    pub fn new<I, S>(package: impl Into<String>, name: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            info: PluginInfo::new(package, name, extensions),
        }
    }
}

/// Any plugin a package can provide
#[derive(Debug, Clone)]
pub enum SourceProcessor {
    Legacy(LegacyHandler),
    Compiler(CompilerPlugin),
    Linter(LinterPlugin),
    Minifier(MinifierPlugin),
}

impl SourceProcessor {
    /// Package providing the plugin
    pub fn package(&self) -> &str {
        match self {
            Self::Legacy(handler) => &handler.package,
            Self::Compiler(plugin) => &plugin.info.package,
            Self::Linter(plugin) => &plugin.info.package,
            Self::Minifier(plugin) => &plugin.info.package,
        }
    }

    /// Extensions claimed, without leading dots
    pub fn extensions(&self) -> &[String] {
        match self {
            Self::Legacy(handler) => std::slice::from_ref(&handler.extension),
            Self::Compiler(plugin) => &plugin.info.extensions,
            Self::Linter(plugin) => &plugin.info.extensions,
            Self::Minifier(plugin) => &plugin.info.extensions,
        }
    }

    pub fn relevant_for_arch(&self, arch: &Arch) -> bool {
        match self {
            Self::Legacy(handler) => handler.relevant_for_arch(arch),
            Self::Compiler(plugin) => plugin.relevant_for_arch(arch),
            Self::Linter(plugin) => plugin.relevant_for_arch(arch),
            Self::Minifier(plugin) => relevant(&plugin.info.arch_matching, arch),
        }
    }

    pub fn is_template(&self) -> bool {
        match self {
            Self::Legacy(handler) => handler.is_template,
            Self::Compiler(plugin) => plugin.info.is_template,
            Self::Linter(plugin) => plugin.info.is_template,
            Self::Minifier(_) => false,
        }
    }
}

impl From<LegacyHandler> for SourceProcessor {
    fn from(handler: LegacyHandler) -> Self {
        Self::Legacy(handler)
    }
}

impl From<CompilerPlugin> for SourceProcessor {
    fn from(plugin: CompilerPlugin) -> Self {
        Self::Compiler(plugin)
    }
}

impl From<LinterPlugin> for SourceProcessor {
    fn from(plugin: LinterPlugin) -> Self {
        Self::Linter(plugin)
    }
}

impl From<MinifierPlugin> for SourceProcessor {
    fn from(plugin: MinifierPlugin) -> Self {
        Self::Minifier(plugin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiler_relevance() {
        let less = CompilerPlugin::new("less", "compile-less", ["less"]).for_arches(["web"]);
        assert!(less.relevant_for_arch(&Arch::web_browser()));
        assert!(less.relevant_for_arch(&Arch::web_cordova()));
        assert!(!less.relevant_for_arch(&Arch::os()));

        let everywhere = CompilerPlugin::new("coffee", "compile-coffee", ["coffee"]);
        assert!(everywhere.relevant_for_arch(&Arch::host()));
    }

    #[test]
    fn test_capabilities_dispatch() {
        let legacy: SourceProcessor = LegacyHandler::new("templating", "html", |_| Ok(()))
            .template()
            .for_arch("web")
            .into();
        assert_eq!(legacy.package(), "templating");
        assert_eq!(legacy.extensions(), ["html".to_string()]);
        assert!(legacy.is_template());
        assert!(!legacy.relevant_for_arch(&Arch::os()));

        let minifier: SourceProcessor =
            MinifierPlugin::new("standard-minifiers", "minify-js", ["js"]).into();
        assert!(!minifier.is_template());
        assert!(minifier.relevant_for_arch(&Arch::os()));
    }

    #[test]
    fn test_closure_linter() {
        let plugin = LinterPlugin::new(
            "jshint",
            "lint-js",
            ["js"],
            |files: &[LintingFile], _: &LintOptions| -> Result<Vec<LintMessage>, String> {
                Ok(files
                    .iter()
                    .map(|f| LintMessage::new(&f.rel_path, "checked"))
                    .collect())
            },
        );
        let file = LintingFile {
            rel_path: "a.js".to_string(),
            contents: Vec::new(),
            package: "p".to_string(),
            hash: String::new(),
            arch: Arch::os(),
        };
        let messages = plugin
            .linter
            .process_files_for_target(&[file], &LintOptions::default())
            .unwrap();
        assert_eq!(messages, vec![LintMessage::new("a.js", "checked")]);
    }
}
