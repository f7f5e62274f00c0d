//! The view of one source file handed to a legacy handler

use crate::fingerprint::hash_bytes;
use crate::unibuild::{CompiledKind, Resource};
use isle_package::{Arch, FileOptions, PackageDescriptor};
use std::path::{Path, PathBuf};

/// Section of the HTML document an `add_html` output goes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlSection {
    Head,
    Body,
}

/// Input and output buffer for one legacy handler invocation
///
/// Outputs are buffered here and only become part of the unibuild when the
/// handler returns `Ok`.
#[derive(Debug)]
pub struct CompileStep<'a> {
    descriptor: &'a PackageDescriptor,
    arch: &'a Arch,
    input_path: &'a str,
    full_input_path: PathBuf,
    contents: &'a [u8],
    hash: &'a str,
    file_options: &'a FileOptions,
    resources: Vec<Resource>,
    errors: Vec<StepError>,
}

/// An error recorded through `CompileStep::error`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepError {
    pub message: String,
    pub line: Option<u32>,
}

impl<'a> CompileStep<'a> {
    pub(crate) fn new(
        descriptor: &'a PackageDescriptor,
        arch: &'a Arch,
        input_path: &'a str,
        full_input_path: PathBuf,
        contents: &'a [u8],
        hash: &'a str,
        file_options: &'a FileOptions,
    ) -> Self {
        Self {
            descriptor,
            arch,
            input_path,
            full_input_path,
            contents,
            hash,
            file_options,
            resources: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Input path relative to the package source root
    pub fn input_path(&self) -> &str {
        self.input_path
    }

    pub fn full_input_path(&self) -> &Path {
        &self.full_input_path
    }

    pub fn contents(&self) -> &[u8] {
        self.contents
    }

    /// Contents as text, lossily decoded
    pub fn contents_as_string(&self) -> String {
        String::from_utf8_lossy(self.contents).into_owned()
    }

    pub fn hash(&self) -> &str {
        self.hash
    }

    pub fn arch(&self) -> &Arch {
        self.arch
    }

    /// Package name; `None` for the app
    pub fn package_name(&self) -> Option<&str> {
        self.descriptor.name.as_deref()
    }

    pub fn file_options(&self) -> &FileOptions {
        self.file_options
    }

    pub fn add_javascript(&mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.push_compiled(CompiledKind::Js, path.into(), data.into());
    }

    pub fn add_stylesheet(&mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.push_compiled(CompiledKind::Css, path.into(), data.into());
    }

    pub fn add_html(&mut self, section: HtmlSection, data: impl Into<Vec<u8>>) {
        let kind = match section {
            HtmlSection::Head => CompiledKind::Head,
            HtmlSection::Body => CompiledKind::Body,
        };
        self.push_compiled(kind, self.input_path.to_string(), data.into());
    }

    /// Add a static asset at a path relative to the package
    pub fn add_asset(&mut self, rel_path: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        let hash = hash_bytes(&data);
        self.resources.push(Resource::asset(self.descriptor, rel_path, data, hash));
    }

    /// Record an error about this file; compilation continues
    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(StepError {
            message: message.into(),
            line: None,
        });
    }

    pub fn error_at_line(&mut self, message: impl Into<String>, line: u32) {
        self.errors.push(StepError {
            message: message.into(),
            line: Some(line),
        });
    }

    fn push_compiled(&mut self, kind: CompiledKind, path: String, data: Vec<u8>) {
        self.resources.push(Resource::Compiled {
            kind,
            path,
            data,
            source_path: self.input_path.to_string(),
        });
    }

    pub(crate) fn into_parts(self) -> (Vec<Resource>, Vec<StepError>) {
        (self.resources, self.errors)
    }
}
