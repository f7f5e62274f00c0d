//! Project Configuration (isle.toml)
//!
//! Handles project-level configuration stored in `isle.toml` at the project root.

use crate::compiler::CompilerConfig;
use crate::ConfigResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Project configuration from isle.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Compiler configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<CompilerConfig>,
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let config: Self = crate::load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(compiler) = &self.compiler {
            compiler.validate()?;
        }
        Ok(())
    }

    /// Compiler table, created on first access
    pub fn compiler_mut(&mut self) -> &mut CompilerConfig {
        self.compiler.get_or_insert_with(CompilerConfig::default)
    }
}
