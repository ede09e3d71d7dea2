//! In-memory front controllers for executor tests

use anyhow::Result;
use chrono::Local;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use super::CancellationGate;
use crate::engine::{
    spawn_watched, ControllerFactory, DiscoveryOptions, EngineMessage, ExecutionOptions,
    FrontController, MessageSink,
};
use crate::error::RunnerError;
use crate::models::{AssemblyJob, TestCase};
use crate::output::ConsoleReporter;

pub(crate) struct Silent;

impl ConsoleReporter for Silent {
    fn on_message(&self, _assembly: &str, _message: &EngineMessage) {}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Outcome {
    Pass,
    Fail,
    Skip,
}

#[derive(Clone)]
pub(crate) struct FakeSuite {
    tests: Vec<(TestCase, Outcome)>,
    delay: Duration,
    time: f64,
    hang: bool,
    crash: bool,
}

impl FakeSuite {
    pub fn new() -> Self {
        Self {
            tests: Vec::new(),
            delay: Duration::ZERO,
            time: 1.0,
            hang: false,
            crash: false,
        }
    }

    pub fn test(mut self, name: &str, outcome: Outcome) -> Self {
        self.tests
            .push((TestCase::new(format!("default::{}", name), name, "default"), outcome));
        self
    }

    pub fn tagged(mut self, name: &str, outcome: Outcome, trait_name: &str, value: &str) -> Self {
        let case = TestCase::new(format!("default::{}", name), name, "default")
            .with_trait(trait_name, value);
        self.tests.push((case, outcome));
        self
    }

    /// Delay execution so completion order differs from submission order
    pub fn delay(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }

    /// Execution is accepted but never reports completion
    pub fn never_finishes(mut self) -> Self {
        self.hang = true;
        self
    }

    /// The execution task panics after the assembly starts
    pub fn crashes(mut self) -> Self {
        self.crash = true;
        self
    }

    fn outcome_of(&self, test_case: &TestCase) -> Outcome {
        self.tests
            .iter()
            .find(|(case, _)| case.unique_id == test_case.unique_id)
            .map(|(_, outcome)| *outcome)
            .unwrap_or(Outcome::Pass)
    }
}

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicUsize,
    released: AtomicUsize,
    executed: AtomicUsize,
}

pub(crate) struct FakeFactory {
    suites: HashMap<PathBuf, FakeSuite>,
    counters: Arc<Counters>,
    cancel_on_discovery: Option<CancellationGate>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self {
            suites: HashMap::new(),
            counters: Arc::new(Counters::default()),
            cancel_on_discovery: None,
        }
    }

    pub fn with_suite(mut self, path: &str, suite: FakeSuite) -> Self {
        self.suites.insert(PathBuf::from(path), suite);
        self
    }

    /// Set the gate while discovery is in progress
    pub fn cancel_on_discovery(mut self, gate: CancellationGate) -> Self {
        self.cancel_on_discovery = Some(gate);
        self
    }

    pub fn acquired(&self) -> usize {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> usize {
        self.counters.executed.load(Ordering::SeqCst)
    }
}

impl ControllerFactory for FakeFactory {
    fn create(&self, job: &AssemblyJob) -> Result<Box<dyn FrontController>> {
        let suite = self.suites.get(&job.assembly_path).cloned().ok_or_else(|| {
            RunnerError::acquisition(
                job.display_name(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such suite"),
            )
        })?;
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(FakeController {
            suite,
            counters: self.counters.clone(),
            cancel_on_discovery: self.cancel_on_discovery.clone(),
        }))
    }
}

struct FakeController {
    suite: FakeSuite,
    counters: Arc<Counters>,
    cancel_on_discovery: Option<CancellationGate>,
}

impl Drop for FakeController {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl FrontController for FakeController {
    fn test_framework(&self) -> String {
        "fake".to_string()
    }

    fn find(
        &self,
        _include_source_info: bool,
        sink: Arc<dyn MessageSink>,
        _options: DiscoveryOptions,
    ) -> Result<()> {
        let cases: Vec<TestCase> = self.suite.tests.iter().map(|(case, _)| case.clone()).collect();
        let gate = self.cancel_on_discovery.clone();

        tokio::spawn(async move {
            for case in cases {
                sink.on_message(EngineMessage::TestCaseDiscovered(case));
            }
            if let Some(gate) = gate {
                gate.set();
            }
            sink.on_message(EngineMessage::DiscoveryComplete);
        });
        Ok(())
    }

    fn run_tests(
        &self,
        test_cases: Vec<TestCase>,
        sink: Arc<dyn MessageSink>,
        _options: ExecutionOptions,
    ) -> Result<()> {
        self.counters.executed.fetch_add(1, Ordering::SeqCst);
        if self.suite.hang {
            return Ok(());
        }

        let suite = self.suite.clone();
        let watcher = sink.clone();
        let execution = async move {
            tokio::time::sleep(suite.delay).await;
            sink.on_message(EngineMessage::AssemblyStarting {
                test_framework: "fake".into(),
                environment: "test".into(),
                started_at: Local::now(),
            });
            if suite.crash {
                panic!("fake engine crashed");
            }

            let (mut failed, mut skipped) = (0, 0);
            for test_case in &test_cases {
                let message = match suite.outcome_of(test_case) {
                    Outcome::Pass => EngineMessage::TestPassed {
                        test_case: test_case.clone(),
                        time: 0.0,
                        output: String::new(),
                    },
                    Outcome::Fail => {
                        failed += 1;
                        EngineMessage::TestFailed {
                            test_case: test_case.clone(),
                            time: 0.0,
                            message: "assertion failed".into(),
                            stack_trace: None,
                            output: String::new(),
                        }
                    }
                    Outcome::Skip => {
                        skipped += 1;
                        EngineMessage::TestSkipped {
                            test_case: test_case.clone(),
                            reason: "skipped".into(),
                        }
                    }
                };
                sink.on_message(message);
            }

            sink.on_message(EngineMessage::AssemblyFinished {
                total: test_cases.len() as u32,
                failed,
                skipped,
                time: suite.time,
            });
        };
        spawn_watched(&Handle::current(), execution, watcher);
        Ok(())
    }
}
