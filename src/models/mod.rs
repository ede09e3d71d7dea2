//! Data models for test assembly runs
//!
//! This module contains the data structures shared by the engine, the
//! executor and the reporting layers.

mod job;
mod summary;
mod test_case;

pub use job::AssemblyJob;
pub use summary::{ExecutionSummary, ExitStatus, RunResult};
pub use test_case::{SourceInfo, TestCase, Traits};
