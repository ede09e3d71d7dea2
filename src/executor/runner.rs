//! Per-assembly runner

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RunnerConfig;
use crate::engine::{
    ControllerFactory, DiscoveryOptions, DiscoverySink, ExecutionOptions, Finished,
    FrontController,
};
use crate::error::RunnerError;
use crate::filter::Filter;
use crate::models::{AssemblyJob, ExecutionSummary, ExitStatus, TestCase};
use crate::output::{ConsoleReporter, StandardReporter, TeamCityReporter};
use crate::results::ReportNode;

use super::failure::log_failure;
use super::visitor::{error_fragment, ExecutionVisitor};
use super::CancellationGate;

/// Settings shared by every job of one run
#[derive(Clone, Debug, Default)]
pub struct RunnerOptions {
    pub parallelize_test_collections: bool,
    pub max_parallel_threads: usize,
    /// Build report fragments for the aggregator
    pub needs_report: bool,
    pub verbose: bool,
    pub teamcity: bool,
    pub phase_timeout: Option<Duration>,
    pub diagnostic_messages: bool,
}

impl RunnerOptions {
    pub fn from_config(config: &RunnerConfig, needs_report: bool) -> Self {
        Self {
            parallelize_test_collections: config.parallelize_test_collections,
            max_parallel_threads: config.max_parallel_threads,
            needs_report,
            verbose: config.verbose,
            teamcity: config.teamcity,
            phase_timeout: config.phase_timeout_secs.map(Duration::from_secs),
            diagnostic_messages: config.diagnostic_messages,
        }
    }
}

/// Result of running one job
#[derive(Clone, Debug)]
pub enum AssemblyOutcome {
    /// Cancelled before execution began; contributes nothing
    Cancelled,
    Completed {
        summary: ExecutionSummary,
        fragment: Option<ReportNode>,
    },
    /// The job could not run. No summary is recorded.
    Failed { fragment: Option<ReportNode> },
}

impl AssemblyOutcome {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            AssemblyOutcome::Cancelled => ExitStatus::Success,
            AssemblyOutcome::Completed { summary, .. } if summary.failed > 0 => {
                ExitStatus::TestsFailed
            }
            AssemblyOutcome::Completed { .. } => ExitStatus::Success,
            AssemblyOutcome::Failed { .. } => ExitStatus::Fatal,
        }
    }

    pub fn summary(&self) -> Option<ExecutionSummary> {
        match self {
            AssemblyOutcome::Completed { summary, .. } => Some(*summary),
            _ => None,
        }
    }

    pub fn into_fragment(self) -> Option<ReportNode> {
        match self {
            AssemblyOutcome::Cancelled => None,
            AssemblyOutcome::Completed { fragment, .. } | AssemblyOutcome::Failed { fragment } => {
                fragment
            }
        }
    }
}

/// Drives one assembly through acquire, discover, filter and execute.
///
/// The controller is released when the run returns, on every path.
pub struct AssemblyRunner {
    factory: Arc<dyn ControllerFactory>,
    filter: Filter,
    gate: CancellationGate,
    options: RunnerOptions,
    reporter: Arc<dyn ConsoleReporter>,
}

impl AssemblyRunner {
    pub fn new(
        factory: Arc<dyn ControllerFactory>,
        filter: Filter,
        gate: CancellationGate,
        options: RunnerOptions,
    ) -> Self {
        if !filter.is_empty() {
            debug!(
                "Trait filter: include [{}], exclude [{}]",
                filter.included(),
                filter.excluded()
            );
        }

        let reporter: Arc<dyn ConsoleReporter> = if options.teamcity {
            Arc::new(TeamCityReporter::new())
        } else {
            Arc::new(StandardReporter::new(options.verbose))
        };

        Self {
            factory,
            filter,
            gate,
            options,
            reporter,
        }
    }

    /// Replace the console reporter chosen from the options
    pub fn with_reporter(mut self, reporter: Arc<dyn ConsoleReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run one job. Failures are logged and folded into the outcome.
    pub async fn run(&self, job: &AssemblyJob) -> AssemblyOutcome {
        if self.gate.is_set() {
            debug!("Cancelled before start: {}", job);
            return AssemblyOutcome::Cancelled;
        }

        match self.try_run(job).await {
            Ok(outcome) => outcome,
            Err(err) => {
                log_failure(&job.display_name(), &err);
                AssemblyOutcome::Failed {
                    fragment: self
                        .options
                        .needs_report
                        .then(|| error_fragment(job, &err)),
                }
            }
        }
    }

    /// Discover and filter without executing
    pub async fn list(&self, job: &AssemblyJob) -> Result<Vec<TestCase>> {
        let controller = self.factory.create(job)?;
        let discovered = self.discover(controller.as_ref(), true).await?;
        Ok(self.filter.apply(discovered))
    }

    async fn try_run(&self, job: &AssemblyJob) -> Result<AssemblyOutcome> {
        let name = job.display_name();
        let controller = self.factory.create(job)?;

        info!("Discovering: {}", name);
        let discovered = self.discover(controller.as_ref(), false).await?;
        let discovered_count = discovered.len();
        let test_cases = self.filter.apply(discovered);
        info!(
            "Discovered:  {} ({} of {} test cases to run)",
            name,
            test_cases.len(),
            discovered_count
        );

        if self.gate.is_set() {
            debug!("Cancelled before execution: {}", job);
            return Ok(AssemblyOutcome::Cancelled);
        }

        let visitor = Arc::new(ExecutionVisitor::new(
            job,
            self.options.needs_report,
            self.reporter.clone(),
        ));
        controller.run_tests(test_cases, visitor.clone(), self.execution_options())?;
        self.wait("Execution", visitor.finished()).await?;
        if let Some(reason) = visitor.failure() {
            return Err(RunnerError::EngineFailed {
                phase: "Execution",
                reason,
            }
            .into());
        }

        let (summary, fragment) = visitor.finish();
        Ok(AssemblyOutcome::Completed { summary, fragment })
    }

    async fn discover(
        &self,
        controller: &dyn FrontController,
        include_source_info: bool,
    ) -> Result<Vec<TestCase>> {
        let sink = Arc::new(DiscoverySink::new());
        controller.find(
            include_source_info,
            sink.clone(),
            DiscoveryOptions {
                diagnostic_messages: self.options.diagnostic_messages,
            },
        )?;
        self.wait("Discovery", sink.finished()).await?;
        if let Some(reason) = sink.failure() {
            return Err(RunnerError::EngineFailed {
                phase: "Discovery",
                reason,
            }
            .into());
        }
        Ok(sink.take_test_cases())
    }

    async fn wait(&self, phase: &'static str, finished: &Finished) -> Result<(), RunnerError> {
        match self.options.phase_timeout {
            None => {
                finished.wait().await;
                Ok(())
            }
            Some(limit) => tokio::time::timeout(limit, finished.wait())
                .await
                .map_err(|_| RunnerError::PhaseTimeout {
                    phase,
                    secs: limit.as_secs(),
                }),
        }
    }

    fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            disable_parallelization: !self.options.parallelize_test_collections,
            max_parallel_threads: self.options.max_parallel_threads,
            diagnostic_messages: self.options.diagnostic_messages,
        }
    }
}
