/// Build system error types
///
/// Only unrecoverable conditions live here. Everything a compilation can
/// recover from is reported through `Diagnostics` instead.
use isle_package::{ArchError, PackageError};
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid architecture: {0}")]
    Architecture(#[from] ArchError),

    #[error("Package error: {0}")]
    Package(#[from] PackageError),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Failed to walk source directory {path}: {message}")]
    SourceListing { path: PathBuf, message: String },

    #[error("Watch set serialization failed: {0}")]
    WatchSetSerialization(#[from] serde_json::Error),

    #[error("Build failed: {0}")]
    BuildFailed(String),
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a source listing error
    pub fn source_listing(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::SourceListing {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
