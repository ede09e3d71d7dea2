//! Runner error types

use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Domain errors raised by the engine, executor and report layers
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to acquire test controller for {assembly}")]
    Acquisition {
        assembly: String,
        #[source]
        source: BoxError,
    },

    #[error("Incompatible engine version: assembly uses format {found}, supported up to {supported}")]
    IncompatibleVersion { found: u32, supported: u32 },

    #[error("Test execution could not start: {0}")]
    Execution(String),

    #[error("{phase} aborted by the test engine: {reason}")]
    EngineFailed { phase: &'static str, reason: String },

    #[error("{phase} did not complete within {secs} seconds")]
    PhaseTimeout { phase: &'static str, secs: u64 },

    #[error("Transform '{name}' failed: {reason}")]
    Transform { name: String, reason: String },

    #[error("Unknown transform: {0}")]
    UnknownTransform(String),

    #[error("Failed to write {}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl RunnerError {
    pub fn acquisition(assembly: impl Into<String>, source: impl Into<BoxError>) -> Self {
        RunnerError::Acquisition {
            assembly: assembly.into(),
            source: source.into(),
        }
    }

    /// Qualified variant name, used when printing cause chains.
    pub fn kind(&self) -> &'static str {
        match self {
            RunnerError::Acquisition { .. } => "RunnerError::Acquisition",
            RunnerError::IncompatibleVersion { .. } => "RunnerError::IncompatibleVersion",
            RunnerError::Execution(_) => "RunnerError::Execution",
            RunnerError::EngineFailed { .. } => "RunnerError::EngineFailed",
            RunnerError::PhaseTimeout { .. } => "RunnerError::PhaseTimeout",
            RunnerError::Transform { .. } => "RunnerError::Transform",
            RunnerError::UnknownTransform(_) => "RunnerError::UnknownTransform",
            RunnerError::OutputWrite { .. } => "RunnerError::OutputWrite",
            RunnerError::Config(_) => "RunnerError::Config",
        }
    }
}
