//! Build diagnostics
//!
//! A `Diagnostics` sink is passed explicitly into every component of a
//! compilation. Recoverable problems are appended to it and compilation
//! continues, so one pass surfaces as many errors as possible. Sinks are
//! append-only; independent units of work fill their own sink and the caller
//! merges them in a fixed order.

use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::path::PathBuf;

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// What kind of problem a diagnostic describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Two plugins claim the same extension or minifier slot
    Conflict,
    /// A declared source file could not be read
    MissingSource,
    /// A legacy handler failed
    HandlerFailed,
    /// A linter plugin failed
    LinterFailed,
    /// A message reported by a linter about linted code
    Lint,
    /// A plugin claim that was ignored
    IgnoredClaim,
}

/// A single build message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Title of the job this message was reported under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
            path: None,
            line: None,
            job: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, message)
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(job) = &self.job {
            write!(f, "While {}:\n  ", job)?;
        }
        if let Some(path) = &self.path {
            write!(f, "{}", path.display())?;
            if let Some(line) = self.line {
                write!(f, ":{}", line)?;
            }
            write!(f, ": ")?;
        }
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", label, self.message)
    }
}

/// Per-compilation diagnostics sink
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
    #[serde(skip)]
    job: Option<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic, tagging it with the current job
    pub fn push(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.job.is_none() {
            diagnostic.job = self.job.clone();
        }
        self.messages.push(diagnostic);
    }

    /// Report an error
    pub fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic::error(kind, message));
    }

    /// Report an error about a specific path
    pub fn error_at(
        &mut self,
        kind: DiagnosticKind,
        message: impl Into<String>,
        path: impl Into<PathBuf>,
    ) {
        self.push(Diagnostic::error(kind, message).with_path(path));
    }

    /// Report a warning
    pub fn warning(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic::warning(kind, message));
    }

    /// Run `f` with every message it reports tagged with `title`
    pub fn with_job<T>(&mut self, title: impl Into<String>, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = self.job.replace(title.into());
        let result = f(self);
        self.job = previous;
        result
    }

    /// Append all messages from another sink, preserving their order
    pub fn merge(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|d| d.is_error()).count()
    }

    /// Messages of one kind
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter().filter(move |d| d.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.messages
    }
}

/// Text of a panic caught at a plugin fault boundary
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "plugin panicked".to_string()
    }
}
