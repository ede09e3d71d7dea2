//! Front controller contract

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::MessageSink;
use crate::models::{AssemblyJob, TestCase};

/// Options for the discovery phase
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscoveryOptions {
    /// Emit engine diagnostic messages while discovering
    pub diagnostic_messages: bool,
}

/// Options for the execution phase
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecutionOptions {
    pub disable_parallelization: bool,
    /// Upper bound on concurrently running test collections; 0 means one
    /// per available CPU
    pub max_parallel_threads: usize,
    pub diagnostic_messages: bool,
}

impl ExecutionOptions {
    pub fn effective_max_threads(&self) -> usize {
        if self.disable_parallelization {
            return 1;
        }
        match self.max_parallel_threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n.min(Semaphore::MAX_PERMITS),
        }
    }
}

/// Discovery and execution capability for one assembly.
///
/// Both calls return as soon as the work is submitted; completion is
/// signalled through the sink. The capability is released when dropped.
pub trait FrontController: Send + Sync {
    /// Name of the engine reported in test results
    fn test_framework(&self) -> String;

    fn find(
        &self,
        include_source_info: bool,
        sink: Arc<dyn MessageSink>,
        options: DiscoveryOptions,
    ) -> Result<()>;

    fn run_tests(
        &self,
        test_cases: Vec<TestCase>,
        sink: Arc<dyn MessageSink>,
        options: ExecutionOptions,
    ) -> Result<()>;
}

/// Acquires a front controller scoped to one job
pub trait ControllerFactory: Send + Sync {
    fn create(&self, job: &AssemblyJob) -> Result<Box<dyn FrontController>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_max_threads() {
        let serial = ExecutionOptions {
            disable_parallelization: true,
            max_parallel_threads: 8,
            ..Default::default()
        };
        assert_eq!(serial.effective_max_threads(), 1);

        let bounded = ExecutionOptions {
            max_parallel_threads: 3,
            ..Default::default()
        };
        assert_eq!(bounded.effective_max_threads(), 3);

        assert!(ExecutionOptions::default().effective_max_threads() >= 1);
    }

    #[test]
    fn test_max_threads_clamped_to_semaphore_limit() {
        let unbounded = ExecutionOptions {
            max_parallel_threads: usize::MAX,
            ..Default::default()
        };
        assert_eq!(unbounded.effective_max_threads(), Semaphore::MAX_PERMITS);
        let _ = Semaphore::new(unbounded.effective_max_threads());
    }
}
