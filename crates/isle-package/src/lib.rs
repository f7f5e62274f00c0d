//! Isle package descriptors
//!
//! Architecture tags, the package descriptor data model, the `package.toml`
//! manifest format, and descriptor validation.

pub mod arch;
pub mod descriptor;
pub mod manifest;
pub mod validator;

pub use arch::{most_specific_match, Arch, ArchError, ALL_ARCHES};
pub use descriptor::{
    ArchDescriptor, Export, FileOptions, PackageDescriptor, PackageUse, SourceItem, MAIN_KIND,
};
pub use manifest::{PackageManifest, MANIFEST_FILE};
pub use validator::{ValidationError, Validator};

/// Package errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Failed to parse manifest: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize manifest: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Arch(#[from] ArchError),

    #[error("Validation failed: {}", format_validation(.0))]
    Validation(Vec<ValidationError>),
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, PackageError>;
