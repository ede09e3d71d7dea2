//! Run coordination across assemblies

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

use crate::engine::host_environment;
use crate::models::{AssemblyJob, ExecutionSummary, ExitStatus, RunResult};
use crate::output::SummaryTable;
use crate::utils::Timer;

use super::{AssemblyOutcome, AssemblyRunner};

/// Per-assembly summaries keyed by display name, shared by concurrent jobs
#[derive(Clone, Debug, Default)]
pub struct CompletionMessages {
    inner: Arc<Mutex<BTreeMap<String, ExecutionSummary>>>,
}

impl CompletionMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a summary. A later entry under the same name replaces the
    /// earlier one.
    pub fn insert(&self, name: String, summary: ExecutionSummary) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map.insert(name.clone(), summary).is_some() {
            warn!("Duplicate assembly name '{}': earlier summary replaced", name);
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, ExecutionSummary> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Runs a batch of jobs and merges their results
pub struct RunCoordinator {
    runner: Arc<AssemblyRunner>,
}

impl RunCoordinator {
    pub fn new(runner: AssemblyRunner) -> Self {
        Self {
            runner: Arc::new(runner),
        }
    }

    /// Run every job and return the merged result.
    ///
    /// Fragments keep job submission order regardless of completion order.
    pub async fn execute(&self, jobs: &[AssemblyJob], parallelize_assemblies: bool) -> RunResult {
        info!(
            "testrun v{} ({})",
            env!("CARGO_PKG_VERSION"),
            host_environment()
        );

        let timer = Timer::start("run");
        let messages = CompletionMessages::new();

        let outcomes = if parallelize_assemblies {
            self.run_parallel(jobs, &messages).await
        } else {
            self.run_serial(jobs, &messages).await
        };

        let mut exit_status = ExitStatus::Success;
        let mut fragments = Vec::new();
        for outcome in outcomes {
            exit_status = exit_status.merge(outcome.exit_status());
            if let Some(fragment) = outcome.into_fragment() {
                fragments.push(fragment);
            }
        }

        let per_assembly = messages.snapshot();
        if let Some(summary) = summary_report(&per_assembly) {
            println!("{}", summary);
        }
        info!("Run completed in {}ms", timer.stop().as_millis());

        RunResult {
            per_assembly,
            fragments,
            exit_status,
        }
    }

    async fn run_serial(
        &self,
        jobs: &[AssemblyJob],
        messages: &CompletionMessages,
    ) -> Vec<AssemblyOutcome> {
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            outcomes.push(run_and_record(&self.runner, job, messages).await);
        }
        outcomes
    }

    async fn run_parallel(
        &self,
        jobs: &[AssemblyJob],
        messages: &CompletionMessages,
    ) -> Vec<AssemblyOutcome> {
        let handles: Vec<_> = jobs
            .iter()
            .cloned()
            .map(|job| {
                let runner = self.runner.clone();
                let messages = messages.clone();
                tokio::spawn(async move { run_and_record(&runner, &job, &messages).await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(jobs)
            .map(|(joined, job)| {
                joined.unwrap_or_else(|err| {
                    error!("{}: runner task aborted: {}", job.display_name(), err);
                    AssemblyOutcome::Failed { fragment: None }
                })
            })
            .collect()
    }
}

/// Console summary table, or `None` when no assembly completed
fn summary_report(per_assembly: &BTreeMap<String, ExecutionSummary>) -> Option<String> {
    if per_assembly.is_empty() {
        return None;
    }
    let mut lines = vec!["=== TEST EXECUTION SUMMARY ===".to_string()];
    lines.extend(SummaryTable::new(per_assembly).lines());
    Some(lines.join("\n"))
}

async fn run_and_record(
    runner: &AssemblyRunner,
    job: &AssemblyJob,
    messages: &CompletionMessages,
) -> AssemblyOutcome {
    let outcome = runner.run(job).await;
    if let Some(summary) = outcome.summary() {
        messages.insert(job.display_name(), summary);
    }
    outcome
}
