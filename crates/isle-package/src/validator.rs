//! Package descriptor validation
//!
//! Validation collects every problem in a descriptor instead of stopping at
//! the first one, so a single pass reports everything the author must fix.

use crate::descriptor::PackageDescriptor;
use std::collections::HashSet;

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid package name format
    InvalidPackageName(String),
    /// A package lists itself as a dependency
    SelfDependency { arch: String },
    /// The same symbol is exported twice for one architecture
    DuplicateExport { name: String, arch: String },
    /// A declared source file has an empty path
    EmptySourcePath { arch: String },
    /// The same architecture is declared twice
    DuplicateArch(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidPackageName(name) => {
                write!(f, "Invalid package name: {}", name)
            }
            ValidationError::SelfDependency { arch } => {
                write!(f, "Package uses itself on {}", arch)
            }
            ValidationError::DuplicateExport { name, arch } => {
                write!(f, "Symbol '{}' exported twice on {}", name, arch)
            }
            ValidationError::EmptySourcePath { arch } => {
                write!(f, "Empty source file path on {}", arch)
            }
            ValidationError::DuplicateArch(arch) => {
                write!(f, "Architecture declared twice: {}", arch)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Package descriptor validator
pub struct Validator;

impl Validator {
    /// Validate a package descriptor
    pub fn validate(descriptor: &PackageDescriptor) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(name) = &descriptor.name {
            if let Err(e) = Self::validate_package_name(name) {
                errors.push(e);
            }
        }

        let mut seen_arches = HashSet::new();
        for arch in &descriptor.architectures {
            let tag = arch.arch.to_string();

            if !seen_arches.insert(arch.arch.clone()) {
                errors.push(ValidationError::DuplicateArch(tag.clone()));
            }

            if let Some(name) = &descriptor.name {
                if arch.uses.iter().any(|u| &u.package == name) {
                    errors.push(ValidationError::SelfDependency { arch: tag.clone() });
                }
            }

            let mut exported = HashSet::new();
            for export in &arch.exports {
                if !exported.insert(export.name.as_str()) {
                    errors.push(ValidationError::DuplicateExport {
                        name: export.name.clone(),
                        arch: tag.clone(),
                    });
                }
            }

            if let Some(sources) = &arch.sources {
                if sources.iter().any(|s| s.rel_path.trim().is_empty()) {
                    errors.push(ValidationError::EmptySourcePath { arch: tag.clone() });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate package name format
    ///
    /// Names are lowercase letters, digits, `-` and `.`, optionally prefixed
    /// with a single `author:` segment.
    pub fn validate_package_name(name: &str) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::InvalidPackageName(
                "Package name cannot be empty".to_string(),
            ));
        }

        let (author, local) = match name.split_once(':') {
            Some((author, local)) => (Some(author), local),
            None => (None, name),
        };

        for segment in author.into_iter().chain(std::iter::once(local)) {
            if segment.is_empty() {
                return Err(ValidationError::InvalidPackageName(format!(
                    "'{}' has an empty segment",
                    name
                )));
            }

            if !segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
            {
                return Err(ValidationError::InvalidPackageName(format!(
                    "'{}' contains invalid characters (only lowercase, digits, -, . allowed)",
                    name
                )));
            }

            if segment.starts_with('.') || segment.ends_with('.') {
                return Err(ValidationError::InvalidPackageName(format!(
                    "'{}' cannot start or end with .",
                    name
                )));
            }
        }

        if name.len() > 214 {
            return Err(ValidationError::InvalidPackageName(format!(
                "'{}' exceeds maximum length of 214 characters",
                name
            )));
        }

        Ok(())
    }
}
