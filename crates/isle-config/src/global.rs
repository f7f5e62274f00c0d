//! Global Configuration (~/.isle/config.toml)
//!
//! Handles user-level defaults stored in `~/.isle/config.toml`.

use crate::compiler::CompilerConfig;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.isle/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Compiler defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<CompilerConfig>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let config: Self = crate::load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(compiler) = &self.compiler {
            compiler.validate()?;
        }
        Ok(())
    }

    /// Get the global config file path (~/.isle/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".isle").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_config() {
        let toml = r#"
[compiler]
parallel = false
include-cordova = true
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        let compiler = config.compiler.unwrap();
        assert_eq!(compiler.parallel, Some(false));
        assert_eq!(compiler.include_cordova, Some(true));
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(toml::from_str::<GlobalConfig>("[lsp]\nhover = true\n").is_err());
    }

    #[test]
    fn test_global_config_path_under_home() {
        if let Ok(path) = GlobalConfig::global_config_path() {
            assert!(path.ends_with(".isle/config.toml"));
        }
    }
}
