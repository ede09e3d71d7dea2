//! Report aggregation
//!
//! Merges per-assembly fragments under one root and writes every
//! requested output. A failing output never prevents the others.

use std::path::PathBuf;
use tracing::{error, info};

use super::{write_atomic, ReportNode, ReportTransform};
use crate::error::RunnerError;

/// A transform bound to its destination file
struct ReportOutput {
    transform: Box<dyn ReportTransform>,
    path: PathBuf,
}

/// Result of writing all outputs
#[derive(Debug, Default)]
pub struct WriteOutcome {
    pub written: Vec<PathBuf>,
    pub failures: Vec<RunnerError>,
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Accumulates report fragments and renders the configured outputs
#[derive(Default)]
pub struct ReportAggregator {
    outputs: Vec<ReportOutput>,
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_output(&mut self, transform: Box<dyn ReportTransform>, path: impl Into<PathBuf>) {
        self.outputs.push(ReportOutput {
            transform,
            path: path.into(),
        });
    }

    pub fn with_output(mut self, transform: Box<dyn ReportTransform>, path: impl Into<PathBuf>) -> Self {
        self.add_output(transform, path);
        self
    }

    /// Whether any output needs report fragments at all
    pub fn needs_report(&self) -> bool {
        !self.outputs.is_empty()
    }

    /// Concatenate fragments under one `assemblies` root, in the given order
    pub fn aggregate(fragments: impl IntoIterator<Item = ReportNode>) -> ReportNode {
        let mut root = ReportNode::new("assemblies");
        for fragment in fragments {
            root.push(fragment);
        }
        root
    }

    /// Render and write every output independently
    pub fn write_all(&self, document: &ReportNode) -> WriteOutcome {
        let mut outcome = WriteOutcome::default();

        for output in &self.outputs {
            let result = output
                .transform
                .render(document)
                .and_then(|bytes| write_atomic(&output.path, &bytes));

            match result {
                Ok(()) => {
                    info!(
                        "Wrote {} report to {}",
                        output.transform.name(),
                        output.path.display()
                    );
                    outcome.written.push(output.path.clone());
                }
                Err(e) => {
                    error!(
                        "Skipping {} report {}: {}",
                        output.transform.name(),
                        output.path.display(),
                        e
                    );
                    outcome.failures.push(e);
                }
            }
        }

        outcome
    }
}
