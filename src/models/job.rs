//! Assembly job model
//!
//! One job is one (assembly, config) pair handed to a single runner.

use std::fmt;
use std::path::{Path, PathBuf};

/// A test assembly plus its optional configuration file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyJob {
    pub assembly_path: PathBuf,
    pub config_path: Option<PathBuf>,
}

impl AssemblyJob {
    pub fn new(assembly_path: impl Into<PathBuf>) -> Self {
        Self {
            assembly_path: assembly_path.into(),
            config_path: None,
        }
    }

    pub fn with_config(mut self, config_path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(config_path.into());
        self
    }

    /// Parse a command-line job spec of the form `ASSEMBLY[,CONFIG]`.
    ///
    /// An empty config part is treated as "no config".
    pub fn parse(spec: &str) -> Option<Self> {
        let (assembly, config) = match spec.split_once(',') {
            Some((assembly, config)) => (assembly.trim(), config.trim()),
            None => (spec.trim(), ""),
        };

        if assembly.is_empty() {
            return None;
        }

        let job = Self::new(assembly);
        if config.is_empty() {
            Some(job)
        } else {
            Some(job.with_config(config))
        }
    }

    /// Key used in the per-assembly summary table: the file name without
    /// its extension.
    pub fn display_name(&self) -> String {
        display_name_of(&self.assembly_path)
    }
}

fn display_name_of(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl fmt::Display for AssemblyJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.assembly_path.display())?;
        if let Some(config) = &self.config_path {
            write!(f, " ({})", config.display())?;
        }
        Ok(())
    }
}
