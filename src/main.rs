//! testrun - parallel test assembly runner
//!
//! Discovers and executes the tests in one or more test assemblies,
//! optionally in parallel, and aggregates the per-assembly results into a
//! console summary plus XML, HTML, JSON or CSV reports.
//!
//! ## Features
//!
//! - Discovery, trait filtering and execution per assembly
//! - Concurrent assemblies and concurrent test collections within one
//! - Cancellation with Ctrl-C between phases
//! - Deterministic report ordering regardless of completion order
//! - TeamCity service messages
//!
//! ## Usage
//!
//! ```bash
//! # Run two suites concurrently and write an XML report
//! testrun run suites/math.yaml suites/io.yaml,suites/io.json --parallel-assemblies --xml results.xml
//!
//! # Only run fast tests
//! testrun run suites/math.yaml --include-traits "category=fast"
//!
//! # List what would run
//! testrun list suites/math.yaml --exclude-traits "category=slow"
//!
//! # Show the effective configuration
//! testrun config show
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

mod cli;
mod config;
mod engine;
mod error;
mod executor;
mod filter;
mod models;
mod output;
mod results;
mod utils;

use cli::{Args, Command, ConfigAction, ListArgs, RunArgs};
use config::{EnvConfig, RunnerConfig};
use engine::ManifestFactory;
use executor::{log_failure, AssemblyRunner, CancellationGate, RunCoordinator, RunnerOptions};
use filter::Filter;
use output::format_test_listing;
use results::{transform_by_name, ReportAggregator};
use utils::{init_logger, LogLevel, LogTarget};

const DEFAULT_CONFIG_FILE: &str = "testrun.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env = EnvConfig::load();
    let config_file = args.config.clone().or_else(|| env.config_file.clone());
    let mut config = load_config(config_file.as_deref())?;
    env.apply_to(&mut config);
    if args.verbose {
        config.verbose = true;
    }

    let requested_level = args.log_level.as_deref().map(|s| (s, LogLevel::from_str(s)));
    let level = match requested_level {
        Some((_, Some(level))) => level,
        _ => LogLevel::from_verbose(config.verbose),
    };
    let teamcity = config.teamcity || matches!(&args.command, Command::Run(run) if run.teamcity);
    init_logger(
        level,
        if teamcity {
            LogTarget::Stderr
        } else {
            LogTarget::Console
        },
    );
    if let Some((name, None)) = requested_level {
        warn!("Unknown log level '{}', using {:?}", name, level);
    }

    match args.command {
        Command::Run(run_args) => {
            run_args.apply_to(&mut config);
            config.validate()?;
            let code = run(&config, &run_args).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Command::List(list_args) => {
            list_args.apply_to(&mut config);
            config.validate()?;
            if !list(&config, &list_args).await? {
                std::process::exit(-1);
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Show => show_config(&config, config_file.as_deref())?,
            ConfigAction::Init { path, force } => init_config(path, force)?,
        },
    }

    Ok(())
}

/// Explicit file if given, otherwise the first standard location, otherwise defaults
fn load_config(path: Option<&Path>) -> Result<RunnerConfig> {
    match path {
        Some(path) => RunnerConfig::load(path),
        None => config::load_default(),
    }
}

fn build_runner(config: &RunnerConfig, gate: CancellationGate, needs_report: bool) -> AssemblyRunner {
    let factory = ManifestFactory::new().with_working_folder(config.working_folder.clone());
    let filter = Filter::from_trait_strings(
        config.include_traits.as_deref(),
        config.exclude_traits.as_deref(),
    );
    AssemblyRunner::new(
        Arc::new(factory),
        filter,
        gate,
        RunnerOptions::from_config(config, needs_report),
    )
}

/// Set the gate on Ctrl-C. Running engine calls finish; no new phase starts.
fn spawn_cancel_handler(gate: CancellationGate) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancelling: running assemblies will finish their current phase");
            gate.set();
        }
    });
}

async fn run(config: &RunnerConfig, args: &RunArgs) -> Result<i32> {
    let jobs = cli::parse_jobs(&args.jobs)?;

    let mut aggregator = ReportAggregator::new();
    for (name, path) in args.outputs() {
        aggregator.add_output(transform_by_name(name)?, path.clone());
    }

    let gate = CancellationGate::new();
    spawn_cancel_handler(gate.clone());

    let runner = build_runner(config, gate.clone(), aggregator.needs_report());
    let result = RunCoordinator::new(runner)
        .execute(&jobs, config.parallelize_assemblies)
        .await;
    let code = result.exit_code();
    let grand_total = result.grand_total();

    if gate.is_set() && result.is_empty() {
        warn!("Run cancelled before any assembly executed");
    }

    if aggregator.needs_report() {
        let document = ReportAggregator::aggregate(result.fragments);
        let outcome = aggregator.write_all(&document);
        if !outcome.is_success() {
            warn!(
                "{} of {} report outputs could not be written",
                outcome.failures.len(),
                outcome.failures.len() + outcome.written.len()
            );
        }
    }

    debug!("{} -> exit code {}", grand_total, code);
    Ok(code)
}

/// Print the filtered test cases of every job. Returns false if any job
/// could not be inspected.
async fn list(config: &RunnerConfig, args: &ListArgs) -> Result<bool> {
    let jobs = cli::parse_jobs(&args.jobs)?;
    let runner = build_runner(config, CancellationGate::new(), false);

    let mut all_listed = true;
    for job in &jobs {
        match runner.list(job).await {
            Ok(test_cases) => print!("{}", format_test_listing(&job.display_name(), &test_cases)),
            Err(err) => {
                log_failure(&job.display_name(), &err);
                all_listed = false;
            }
        }
    }
    Ok(all_listed)
}

fn show_config(config: &RunnerConfig, explicit: Option<&Path>) -> Result<()> {
    match explicit.map(Path::to_path_buf).or_else(config::find_config) {
        Some(path) => println!("# Loaded from {}", path.display()),
        None => println!("# No config file found, using defaults"),
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    RunnerConfig::default().save(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
