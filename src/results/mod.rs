//! Report document and output artifacts
//!
//! Per-assembly report fragments are merged into one `assemblies`
//! document, which named transforms render to output files.

mod aggregator;
mod document;
mod transform;
mod writer;

pub use aggregator::{ReportAggregator, WriteOutcome};
pub use document::ReportNode;
pub use transform::{transform_by_name, ReportTransform, TRANSFORM_NAMES};
pub use writer::write_atomic;
