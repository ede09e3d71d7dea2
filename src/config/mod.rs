//! Configuration module
//!
//! Handles loading and managing runner configuration. Values are layered:
//! defaults, then the config file, then `TESTRUN_*` environment variables,
//! then command-line flags.

mod env;
mod file;

pub use env::EnvConfig;
pub use file::{find_config, is_yaml_file, load_default};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::RunnerError;

/// Runner configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Run assemblies concurrently
    pub parallelize_assemblies: bool,

    /// Let the engine run test collections of one assembly concurrently
    pub parallelize_test_collections: bool,

    /// Bound on concurrent collections per assembly (0 = CPU count)
    pub max_parallel_threads: usize,

    /// Delimited `name=value;...` traits a test must carry one of
    pub include_traits: Option<String>,

    /// Delimited `name=value;...` traits that exclude a test
    pub exclude_traits: Option<String>,

    /// Report passing and skipped tests as well as failures
    pub verbose: bool,

    /// Emit TeamCity service messages instead of standard output
    pub teamcity: bool,

    /// Working directory for test commands
    pub working_folder: Option<PathBuf>,

    /// Give up on a discovery or execution phase after this many seconds
    pub phase_timeout_secs: Option<u64>,

    /// Forward engine diagnostic messages to the debug log
    pub diagnostic_messages: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            parallelize_assemblies: false,
            parallelize_test_collections: true,
            max_parallel_threads: 0,
            include_traits: None,
            exclude_traits: None,
            verbose: false,
            teamcity: false,
            working_folder: None,
            phase_timeout_secs: None,
            diagnostic_messages: false,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.phase_timeout_secs == Some(0) {
            return Err(RunnerError::Config(
                "phase_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(folder) = &self.working_folder {
            if folder.as_os_str().is_empty() {
                return Err(RunnerError::Config(
                    "working_folder must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert!(config.parallelize_test_collections);
        assert!(!config.parallelize_assemblies);
        assert_eq!(config.max_parallel_threads, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("testrun.yaml");
        std::fs::write(&path, "parallelize_assemblies: true\nmax_parallel_threads: 2\n").unwrap();

        let config = RunnerConfig::load(&path).unwrap();
        assert!(config.parallelize_assemblies);
        assert!(config.parallelize_test_collections);
        assert_eq!(config.max_parallel_threads, 2);
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("testrun.json");

        let config = RunnerConfig {
            include_traits: Some("category=fast".to_string()),
            phase_timeout_secs: Some(30),
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(RunnerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = RunnerConfig {
            phase_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RunnerError::Config(_))));
    }
}
