//! Manifest-driven front controller
//!
//! An assembly is a YAML or JSON suite manifest whose test cases are shell
//! commands. A test passes when its command exits with status 0.
//!
//! ```yaml
//! format_version: 1
//! tests:
//!   - name: adds
//!     collection: math
//!     command: test $((1 + 1)) -eq 2
//!     traits:
//!       category: fast
//! ```

use anyhow::{Context, Result};
use chrono::Local;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use super::{
    host_environment, spawn_watched, ControllerFactory, DiscoveryOptions, EngineMessage,
    ExecutionOptions, FrontController, MessageSink,
};
use crate::config::is_yaml_file;
use crate::error::RunnerError;
use crate::models::{AssemblyJob, SourceInfo, TestCase};
use crate::utils::Timer;

/// Highest manifest format this engine understands
pub const SUPPORTED_FORMAT_VERSION: u32 = 1;

const DEFAULT_COLLECTION: &str = "default";
const ENGINE_NAME: &str = "testrun-manifest";

/// Test suite manifest file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteManifest {
    #[serde(default = "default_format_version")]
    pub format_version: u32,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub tests: Vec<ManifestTest>,
}

fn default_format_version() -> u32 {
    SUPPORTED_FORMAT_VERSION
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

/// A single test entry in a suite manifest
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestTest {
    pub name: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub traits: BTreeMap<String, TraitValues>,

    /// Skip reason; the test is reported as skipped when set
    #[serde(default)]
    pub skip: Option<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub source: Option<SourceInfo>,
}

/// Trait values may be written as a single string or a list
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraitValues {
    One(String),
    Many(Vec<String>),
}

impl TraitValues {
    fn as_slice(&self) -> &[String] {
        match self {
            TraitValues::One(value) => std::slice::from_ref(value),
            TraitValues::Many(values) => values,
        }
    }
}

impl ManifestTest {
    fn unique_id(&self) -> String {
        format!("{}::{}", self.collection, self.name)
    }

    fn to_test_case(&self, include_source_info: bool) -> TestCase {
        let mut test_case = TestCase::new(self.unique_id(), &self.name, &self.collection);
        for (name, values) in &self.traits {
            for value in values.as_slice() {
                test_case = test_case.with_trait(name.as_str(), value.as_str());
            }
        }
        match &self.source {
            Some(source) if include_source_info => test_case.with_source(source.clone()),
            _ => test_case,
        }
    }
}

/// Per-job configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JobConfig {
    /// Extra environment for every test command
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Program and leading arguments used to run a command, `sh -c` by default
    #[serde(default)]
    pub shell: Option<Vec<String>>,

    #[serde(default)]
    pub default_timeout_secs: Option<u64>,
}

fn default_shell() -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string()]
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let document = if is_yaml_file(path) {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON: {}", path.display()))?
    };

    Ok(document)
}

/// Settings shared by every command of one job
#[derive(Debug)]
struct ExecContext {
    shell: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
    default_timeout_secs: Option<u64>,
}

/// Front controller over one suite manifest
#[derive(Debug)]
pub struct ManifestController {
    assembly: String,
    tests: Arc<Vec<ManifestTest>>,
    index: HashMap<String, usize>,
    context: Arc<ExecContext>,
}

impl ManifestController {
    /// Load the manifest and config for `job`.
    ///
    /// `working_folder` is used when the job config does not name its own
    /// working directory.
    pub fn load(job: &AssemblyJob, working_folder: Option<&Path>) -> Result<Self> {
        let assembly = job.assembly_path.display().to_string();

        let manifest: SuiteManifest = read_document(&job.assembly_path)
            .map_err(|e| RunnerError::acquisition(&assembly, e))?;

        if manifest.format_version > SUPPORTED_FORMAT_VERSION {
            return Err(RunnerError::acquisition(
                &assembly,
                RunnerError::IncompatibleVersion {
                    found: manifest.format_version,
                    supported: SUPPORTED_FORMAT_VERSION,
                },
            )
            .into());
        }

        let mut index = HashMap::new();
        for (position, test) in manifest.tests.iter().enumerate() {
            if index.insert(test.unique_id(), position).is_some() {
                return Err(RunnerError::acquisition(
                    &assembly,
                    RunnerError::Config(format!("duplicate test '{}'", test.unique_id())),
                )
                .into());
            }
        }

        let config: JobConfig = match &job.config_path {
            Some(path) => read_document(path).map_err(|e| RunnerError::acquisition(&assembly, e))?,
            None => JobConfig::default(),
        };

        let shell = config.shell.unwrap_or_else(default_shell);
        if shell.is_empty() {
            return Err(RunnerError::acquisition(
                &assembly,
                RunnerError::Config("shell must name a program".to_string()),
            )
            .into());
        }

        debug!(
            "Acquired controller for {} ({} tests)",
            assembly,
            manifest.tests.len()
        );

        Ok(Self {
            assembly,
            tests: Arc::new(manifest.tests),
            index,
            context: Arc::new(ExecContext {
                shell,
                env: config.env,
                working_dir: config
                    .working_dir
                    .or_else(|| working_folder.map(Path::to_path_buf)),
                default_timeout_secs: config.default_timeout_secs,
            }),
        })
    }

    fn lookup(&self, unique_id: &str) -> Option<&ManifestTest> {
        self.index.get(unique_id).map(|&i| &self.tests[i])
    }
}

impl Drop for ManifestController {
    fn drop(&mut self) {
        debug!("Released controller for {}", self.assembly);
    }
}

fn runtime_handle() -> Result<Handle> {
    Handle::try_current().map_err(|e| RunnerError::Execution(e.to_string()).into())
}

impl FrontController for ManifestController {
    fn test_framework(&self) -> String {
        format!("{ENGINE_NAME}/{SUPPORTED_FORMAT_VERSION}")
    }

    fn find(
        &self,
        include_source_info: bool,
        sink: Arc<dyn MessageSink>,
        options: DiscoveryOptions,
    ) -> Result<()> {
        let handle = runtime_handle()?;
        let tests = self.tests.clone();
        let assembly = self.assembly.clone();
        let watcher = sink.clone();

        let discovery = async move {
            if options.diagnostic_messages {
                sink.on_message(EngineMessage::Diagnostic(format!(
                    "Discovering {} test(s) in {}",
                    tests.len(),
                    assembly
                )));
            }
            for test in tests.iter() {
                sink.on_message(EngineMessage::TestCaseDiscovered(
                    test.to_test_case(include_source_info),
                ));
            }
            sink.on_message(EngineMessage::DiscoveryComplete);
        };
        spawn_watched(&handle, discovery, watcher);

        Ok(())
    }

    fn run_tests(
        &self,
        test_cases: Vec<TestCase>,
        sink: Arc<dyn MessageSink>,
        options: ExecutionOptions,
    ) -> Result<()> {
        let handle = runtime_handle()?;

        let mut plan: Vec<CollectionPlan> = Vec::new();
        for test_case in test_cases {
            let test = self
                .lookup(&test_case.unique_id)
                .ok_or_else(|| {
                    RunnerError::Execution(format!("unknown test case '{}'", test_case.unique_id))
                })?
                .clone();

            match plan.iter_mut().find(|c| c.name == test_case.collection) {
                Some(collection) => collection.tests.push((test_case, test)),
                None => plan.push(CollectionPlan {
                    name: test_case.collection.clone(),
                    tests: vec![(test_case, test)],
                }),
            }
        }

        let run = run_plan(
            self.context.clone(),
            self.test_framework(),
            plan,
            sink.clone(),
            options,
        );
        spawn_watched(&handle, run, sink);

        Ok(())
    }
}

/// Acquires [`ManifestController`]s for jobs
#[derive(Clone, Debug, Default)]
pub struct ManifestFactory {
    working_folder: Option<PathBuf>,
}

impl ManifestFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_folder(mut self, folder: Option<PathBuf>) -> Self {
        self.working_folder = folder;
        self
    }
}

impl ControllerFactory for ManifestFactory {
    fn create(&self, job: &AssemblyJob) -> Result<Box<dyn FrontController>> {
        let controller = ManifestController::load(job, self.working_folder.as_deref())?;
        Ok(Box::new(controller))
    }
}

struct CollectionPlan {
    name: String,
    tests: Vec<(TestCase, ManifestTest)>,
}

#[derive(Clone, Copy, Debug, Default)]
struct CollectionTotals {
    total: u32,
    failed: u32,
    skipped: u32,
}

async fn run_plan(
    context: Arc<ExecContext>,
    test_framework: String,
    plan: Vec<CollectionPlan>,
    sink: Arc<dyn MessageSink>,
    options: ExecutionOptions,
) {
    sink.on_message(EngineMessage::AssemblyStarting {
        test_framework,
        environment: host_environment(),
        started_at: Local::now(),
    });

    let timer = Timer::start("assembly");

    let totals: Vec<CollectionTotals> = if options.disable_parallelization {
        let mut totals = Vec::with_capacity(plan.len());
        for collection in plan {
            totals.push(run_collection(context.clone(), collection, sink.clone()).await);
        }
        totals
    } else {
        let semaphore = Arc::new(Semaphore::new(options.effective_max_threads()));
        let mut planned = Vec::with_capacity(plan.len());
        let mut handles = Vec::with_capacity(plan.len());

        for collection in plan {
            let semaphore = semaphore.clone();
            let context = context.clone();
            let sink = sink.clone();
            planned.push((collection.name.clone(), collection.tests.len() as u32));

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                run_collection(context, collection, sink).await
            }));
        }

        // A collection that died still counts its planned tests, as failures.
        join_all(handles)
            .await
            .into_iter()
            .zip(planned)
            .map(|(result, (name, planned))| {
                result.unwrap_or_else(|e| {
                    error!("Collection '{}' aborted: {}", name, e);
                    CollectionTotals {
                        total: planned,
                        failed: planned,
                        skipped: 0,
                    }
                })
            })
            .collect()
    };

    let sum = totals
        .iter()
        .fold(CollectionTotals::default(), |acc, t| CollectionTotals {
            total: acc.total + t.total,
            failed: acc.failed + t.failed,
            skipped: acc.skipped + t.skipped,
        });

    sink.on_message(EngineMessage::AssemblyFinished {
        total: sum.total,
        failed: sum.failed,
        skipped: sum.skipped,
        time: timer.elapsed_secs(),
    });
}

async fn run_collection(
    context: Arc<ExecContext>,
    collection: CollectionPlan,
    sink: Arc<dyn MessageSink>,
) -> CollectionTotals {
    sink.on_message(EngineMessage::CollectionStarting {
        collection: collection.name.clone(),
    });

    let timer = Timer::start(&collection.name);
    let mut totals = CollectionTotals::default();

    for (test_case, test) in collection.tests {
        totals.total += 1;

        if let Some(reason) = &test.skip {
            totals.skipped += 1;
            sink.on_message(EngineMessage::TestSkipped {
                test_case,
                reason: reason.clone(),
            });
            continue;
        }

        let test_timer = Timer::start(&test.name);
        let outcome = run_command(&context, &test).await;
        let time = test_timer.elapsed_secs();

        match outcome {
            CommandOutcome::Passed { output } => sink.on_message(EngineMessage::TestPassed {
                test_case,
                time,
                output,
            }),
            CommandOutcome::Failed { message, output } => {
                totals.failed += 1;
                sink.on_message(EngineMessage::TestFailed {
                    test_case,
                    time,
                    message,
                    stack_trace: None,
                    output,
                });
            }
        }
    }

    sink.on_message(EngineMessage::CollectionFinished {
        collection: collection.name,
        total: totals.total,
        failed: totals.failed,
        skipped: totals.skipped,
        time: timer.elapsed_secs(),
    });

    totals
}

enum CommandOutcome {
    Passed { output: String },
    Failed { message: String, output: String },
}

async fn run_command(context: &ExecContext, test: &ManifestTest) -> CommandOutcome {
    let Some(command) = test.command.as_deref() else {
        return CommandOutcome::Failed {
            message: "No command configured for test".to_string(),
            output: String::new(),
        };
    };

    let Some((program, args)) = context.shell.split_first() else {
        return CommandOutcome::Failed {
            message: "No shell configured".to_string(),
            output: String::new(),
        };
    };

    let mut cmd = Command::new(program);
    cmd.args(args)
        .arg(command)
        .envs(&context.env)
        .envs(&test.env)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    if let Some(dir) = &context.working_dir {
        cmd.current_dir(dir);
    }

    let output = match test.timeout_secs.or(context.default_timeout_secs) {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), cmd.output()).await {
            Ok(result) => result,
            Err(_) => {
                return CommandOutcome::Failed {
                    message: format!("Test timed out after {secs} seconds"),
                    output: String::new(),
                }
            }
        },
        None => cmd.output().await,
    };

    match output {
        Err(e) => CommandOutcome::Failed {
            message: format!("Failed to start '{program}': {e}"),
            output: String::new(),
        },
        Ok(out) => {
            let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&out.stderr));

            if out.status.success() {
                CommandOutcome::Passed { output: text }
            } else {
                let message = match out.status.code() {
                    Some(code) => format!("Command exited with status {code}"),
                    None => "Command terminated by signal".to_string(),
                };
                CommandOutcome::Failed {
                    message,
                    output: text,
                }
            }
        }
    }
}
