//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::compiler::{CompilerConfig, CompilerSettings};
use crate::global::GlobalConfig;
use crate::project::ProjectConfig;
use crate::ConfigResult;
use std::env;
use std::path::{Path, PathBuf};

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = "isle.toml";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.isle/config.toml) - lowest priority
/// 2. Project config (./isle.toml) - overrides global
/// 3. Environment variables (ISLE_*) - overrides project
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration (environment overrides applied)
    pub project: ProjectConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Project root directory (where isle.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use a specific global config file instead of ~/.isle/config.toml
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find isle.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;

        // Global config is optional
        let global_config = self.load_global_config().unwrap_or_default();

        let project_config = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let global_config = self.load_global_config().unwrap_or_default();
        let project_config = self.apply_env_overrides(project_config)?;

        let project_root = config_path.parent().map(|p| p.to_path_buf());

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Find project configuration by walking up directory tree
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Load global configuration
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => {
                let path = GlobalConfig::global_config_path()?;
                self.global_config_path = Some(path.clone());
                path
            }
        };

        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides to project config
    ///
    /// Recognized: ISLE_HOST_ARCH, ISLE_PARALLEL, ISLE_INCLUDE_CORDOVA, ISLE_LINT
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Ok(host_arch) = env::var("ISLE_HOST_ARCH") {
            config.compiler_mut().host_arch = Some(host_arch);
        }

        if let Ok(parallel) = env::var("ISLE_PARALLEL") {
            config.compiler_mut().parallel = Some(parse_bool(&parallel));
        }

        if let Ok(cordova) = env::var("ISLE_INCLUDE_CORDOVA") {
            config.compiler_mut().include_cordova = Some(parse_bool(&cordova));
        }

        if let Ok(lint) = env::var("ISLE_LINT") {
            config.compiler_mut().lint = Some(parse_bool(&lint));
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has isle.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }

    /// Resolve compiler settings (defaults < global < project < env)
    pub fn compiler_settings(&self) -> CompilerSettings {
        let mut merged = CompilerConfig::default();
        if let Some(global) = &self.global.compiler {
            merged.merge(global);
        }
        if let Some(project) = &self.project.compiler {
            merged.merge(project);
        }
        merged.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(PROJECT_CONFIG_FILE);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    fn loader_without_global(dir: &TempDir) -> ConfigLoader {
        ConfigLoader::new().with_global_config_path(dir.path().join("no-global.toml"))
    }

    #[test]
    #[serial]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), "[compiler]\nparallel = false\n");

        let sub_dir = temp_dir.path().join("packages").join("less");
        fs::create_dir_all(&sub_dir).unwrap();

        let mut loader = loader_without_global(&temp_dir);
        let config = loader.load_from_directory(&sub_dir).unwrap();

        assert_eq!(config.project_root(), Some(temp_dir.path()));
        assert!(!config.compiler_settings().parallel);
    }

    #[test]
    #[serial]
    fn test_env_override_lint() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), "[compiler]\nlint = true\n");

        env::set_var("ISLE_LINT", "no");

        let mut loader = loader_without_global(&temp_dir);
        let config = loader.load_from_directory(temp_dir.path()).unwrap();

        env::remove_var("ISLE_LINT");

        assert!(!config.compiler_settings().lint);
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_host_arch() {
        let temp_dir = TempDir::new().unwrap();

        env::set_var("ISLE_HOST_ARCH", "web.browser");

        let mut loader = loader_without_global(&temp_dir);
        let result = loader.load_from_directory(temp_dir.path());

        env::remove_var("ISLE_HOST_ARCH");

        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_global_then_project_precedence() {
        let temp_dir = TempDir::new().unwrap();
        let global_path = temp_dir.path().join("global.toml");
        fs::write(
            &global_path,
            "[compiler]\ninclude-cordova = true\nparallel = false\n",
        )
        .unwrap();
        create_config_file(temp_dir.path(), "[compiler]\nparallel = true\n");

        let mut loader = ConfigLoader::new().with_global_config_path(&global_path);
        let config = loader.load_from_directory(temp_dir.path()).unwrap();
        let settings = config.compiler_settings();

        assert!(settings.include_cordova_unibuild);
        assert!(settings.parallel);
    }
}
