//! Compiler settings
//!
//! `CompilerConfig` is the partial `[compiler]` table as written in a config
//! file; every field is optional so layers can be merged. `CompilerSettings`
//! is the fully resolved result handed to the build core.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// `[compiler]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct CompilerConfig {
    /// Build the hybrid mobile (web.cordova) unibuild
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_cordova: Option<bool>,

    /// Compile architectures concurrently
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,

    /// Override the detected host architecture (e.g. "os.linux.x86_64")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_arch: Option<String>,

    /// Run linter plugins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lint: Option<bool>,

    /// Report which packages provided plugins to each compilation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_provider_names: Option<bool>,
}

impl CompilerConfig {
    /// Overlay `other` on top of `self`; set fields in `other` win
    pub fn merge(&mut self, other: &CompilerConfig) {
        if let Some(v) = other.include_cordova {
            self.include_cordova = Some(v);
        }
        if let Some(v) = other.parallel {
            self.parallel = Some(v);
        }
        if let Some(v) = &other.host_arch {
            self.host_arch = Some(v.clone());
        }
        if let Some(v) = other.lint {
            self.lint = Some(v);
        }
        if let Some(v) = other.plugin_provider_names {
            self.plugin_provider_names = Some(v);
        }
    }

    /// Validate field values
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(host) = &self.host_arch {
            let valid = host == "os"
                || (host.starts_with("os.") && host.split('.').all(|part| !part.is_empty()));
            if !valid {
                return Err(ConfigError::InvalidValue {
                    field: "compiler.host-arch".to_string(),
                    reason: format!("'{}' is not a server architecture", host),
                });
            }
        }
        Ok(())
    }

    /// Resolve against built-in defaults
    pub fn resolve(&self) -> CompilerSettings {
        let defaults = CompilerSettings::default();
        CompilerSettings {
            include_cordova_unibuild: self
                .include_cordova
                .unwrap_or(defaults.include_cordova_unibuild),
            parallel: self.parallel.unwrap_or(defaults.parallel),
            host_arch: self.host_arch.clone(),
            lint: self.lint.unwrap_or(defaults.lint),
            include_plugin_provider_names: self
                .plugin_provider_names
                .unwrap_or(defaults.include_plugin_provider_names),
        }
    }
}

/// Fully resolved compiler settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerSettings {
    pub include_cordova_unibuild: bool,
    pub parallel: bool,
    pub host_arch: Option<String>,
    pub lint: bool,
    pub include_plugin_provider_names: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            include_cordova_unibuild: false,
            parallel: true,
            host_arch: None,
            lint: true,
            include_plugin_provider_names: true,
        }
    }
}
