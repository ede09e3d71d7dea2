//! Test run orchestration
//!
//! [`AssemblyRunner`] drives one assembly through discovery, filtering and
//! execution. [`RunCoordinator`] fans jobs out serially or concurrently and
//! merges their results. A shared [`CancellationGate`] is checked before
//! each phase starts.

mod cancel;
mod coordinator;
mod failure;
mod runner;
mod visitor;

#[cfg(test)]
mod testing;

pub use cancel::CancellationGate;
pub use coordinator::{CompletionMessages, RunCoordinator};
pub use failure::{cause_chain, log_failure};
pub use runner::{AssemblyOutcome, AssemblyRunner, RunnerOptions};
