//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;
use std::path::PathBuf;

use super::RunnerConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "TESTRUN";

/// Set by TeamCity build agents
const TEAMCITY_MARKER: &str = "TEAMCITY_PROJECT_NAME";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvConfig {
    /// From TESTRUN_PARALLEL_ASSEMBLIES
    pub parallel_assemblies: Option<bool>,
    /// From TESTRUN_MAX_THREADS
    pub max_threads: Option<usize>,
    /// From TESTRUN_INCLUDE_TRAITS
    pub include_traits: Option<String>,
    /// From TESTRUN_EXCLUDE_TRAITS
    pub exclude_traits: Option<String>,
    /// From TESTRUN_VERBOSE
    pub verbose: Option<bool>,
    /// From TESTRUN_CONFIG
    pub config_file: Option<PathBuf>,
    /// From TESTRUN_WORKING_FOLDER
    pub working_folder: Option<PathBuf>,
    /// True when running under a TeamCity agent
    pub teamcity: bool,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}_{name}"));

        Self {
            parallel_assemblies: get("PARALLEL_ASSEMBLIES").map(|v| parse_bool(&v)),
            max_threads: get("MAX_THREADS").and_then(|v| v.parse().ok()),
            include_traits: get("INCLUDE_TRAITS"),
            exclude_traits: get("EXCLUDE_TRAITS"),
            verbose: get("VERBOSE").map(|v| parse_bool(&v)),
            config_file: get("CONFIG").map(PathBuf::from),
            working_folder: get("WORKING_FOLDER").map(PathBuf::from),
            teamcity: lookup(TEAMCITY_MARKER).is_some(),
        }
    }

    /// Overlay the set variables onto `config`
    pub fn apply_to(&self, config: &mut RunnerConfig) {
        if let Some(parallel) = self.parallel_assemblies {
            config.parallelize_assemblies = parallel;
        }
        if let Some(threads) = self.max_threads {
            config.max_parallel_threads = threads;
        }
        if let Some(traits) = &self.include_traits {
            config.include_traits = Some(traits.clone());
        }
        if let Some(traits) = &self.exclude_traits {
            config.exclude_traits = Some(traits.clone());
        }
        if let Some(verbose) = self.verbose {
            config.verbose = verbose;
        }
        if let Some(folder) = &self.working_folder {
            config.working_folder = Some(folder.clone());
        }
        if self.teamcity {
            config.teamcity = true;
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "enabled"
    )
}
