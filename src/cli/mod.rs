//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::RunnerConfig;
use crate::models::AssemblyJob;

/// Parallel test assembly runner with aggregated reporting
#[derive(Parser, Debug)]
#[command(name = "testrun")]
#[command(version)]
#[command(about = "Run test assemblies and aggregate their results")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run test assemblies
    Run(RunArgs),

    /// Discover and list test cases without running them
    List(ListArgs),

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Assemblies to run, each optionally followed by `,CONFIG`
    #[arg(value_name = "ASSEMBLY[,CONFIG]", required = true)]
    pub jobs: Vec<String>,

    /// Run assemblies concurrently
    #[arg(short, long)]
    pub parallel_assemblies: bool,

    /// Run test collections within an assembly one at a time
    #[arg(long)]
    pub no_parallel_collections: bool,

    /// Maximum concurrent test collections per assembly (0 = CPU count)
    #[arg(short, long)]
    pub max_threads: Option<usize>,

    /// Only run tests carrying one of these traits (`name=value;...`)
    #[arg(short, long)]
    pub include_traits: Option<String>,

    /// Skip tests carrying any of these traits (`name=value;...`)
    #[arg(short, long)]
    pub exclude_traits: Option<String>,

    /// Write the native XML report
    #[arg(long, value_name = "PATH")]
    pub xml: Option<PathBuf>,

    /// Write the legacy v1 XML report
    #[arg(long, value_name = "PATH")]
    pub xmlv1: Option<PathBuf>,

    /// Write an HTML report
    #[arg(long, value_name = "PATH")]
    pub html: Option<PathBuf>,

    /// Write a JSON report
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Write a CSV report (one row per test)
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Emit TeamCity service messages
    #[arg(long)]
    pub teamcity: bool,

    /// Working directory for test commands
    #[arg(short, long)]
    pub working_folder: Option<PathBuf>,

    /// Abandon discovery or execution after this many seconds
    #[arg(long, value_name = "SECS")]
    pub phase_timeout: Option<u64>,
}

impl RunArgs {
    /// Overlay the flags given on the command line onto `config`
    pub fn apply_to(&self, config: &mut RunnerConfig) {
        if self.parallel_assemblies {
            config.parallelize_assemblies = true;
        }
        if self.no_parallel_collections {
            config.parallelize_test_collections = false;
        }
        if let Some(threads) = self.max_threads {
            config.max_parallel_threads = threads;
        }
        if let Some(traits) = &self.include_traits {
            config.include_traits = Some(traits.clone());
        }
        if let Some(traits) = &self.exclude_traits {
            config.exclude_traits = Some(traits.clone());
        }
        if self.teamcity {
            config.teamcity = true;
        }
        if let Some(folder) = &self.working_folder {
            config.working_folder = Some(folder.clone());
        }
        if let Some(secs) = self.phase_timeout {
            config.phase_timeout_secs = Some(secs);
        }
    }

    /// Requested report outputs as (transform name, path)
    pub fn outputs(&self) -> Vec<(&'static str, &PathBuf)> {
        [
            ("xml", &self.xml),
            ("xmlv1", &self.xmlv1),
            ("html", &self.html),
            ("json", &self.json),
            ("csv", &self.csv),
        ]
        .into_iter()
        .filter_map(|(name, path)| path.as_ref().map(|p| (name, p)))
        .collect()
    }
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Assemblies to inspect, each optionally followed by `,CONFIG`
    #[arg(value_name = "ASSEMBLY[,CONFIG]", required = true)]
    pub jobs: Vec<String>,

    /// Only list tests carrying one of these traits
    #[arg(short, long)]
    pub include_traits: Option<String>,

    /// Hide tests carrying any of these traits
    #[arg(short, long)]
    pub exclude_traits: Option<String>,

    /// Working directory for test commands
    #[arg(short, long)]
    pub working_folder: Option<PathBuf>,
}

impl ListArgs {
    pub fn apply_to(&self, config: &mut RunnerConfig) {
        if let Some(traits) = &self.include_traits {
            config.include_traits = Some(traits.clone());
        }
        if let Some(traits) = &self.exclude_traits {
            config.exclude_traits = Some(traits.clone());
        }
        if let Some(folder) = &self.working_folder {
            config.working_folder = Some(folder.clone());
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Destination (defaults to ./testrun.yaml)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Parse `ASSEMBLY[,CONFIG]` job specs
pub fn parse_jobs(specs: &[String]) -> Result<Vec<AssemblyJob>> {
    specs
        .iter()
        .map(|spec| match AssemblyJob::parse(spec) {
            Some(job) => Ok(job),
            None => bail!("Invalid assembly argument '{}'", spec),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args() {
        let args = Args::parse_from([
            "testrun",
            "run",
            "suites/math.yaml,suites/math.json",
            "suites/io.yaml",
            "--parallel-assemblies",
            "--max-threads",
            "4",
            "--exclude-traits",
            "category=slow",
            "--xml",
            "out/results.xml",
            "--html",
            "out/results.html",
        ]);
        match args.command {
            Command::Run(run_args) => {
                assert_eq!(run_args.jobs.len(), 2);
                assert!(run_args.parallel_assemblies);
                assert_eq!(run_args.max_threads, Some(4));

                let outputs = run_args.outputs();
                assert_eq!(outputs.len(), 2);
                assert_eq!(outputs[0].0, "xml");
                assert_eq!(outputs[1].0, "html");

                let jobs = parse_jobs(&run_args.jobs).unwrap();
                assert_eq!(
                    jobs[0].config_path,
                    Some(PathBuf::from("suites/math.json"))
                );
                assert_eq!(jobs[1].config_path, None);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_args_override_config() {
        let args = Args::parse_from([
            "testrun",
            "run",
            "a.yaml",
            "--no-parallel-collections",
            "--phase-timeout",
            "30",
            "--teamcity",
        ]);
        let Command::Run(run_args) = args.command else {
            panic!("Expected Run command");
        };

        let mut config = RunnerConfig {
            max_parallel_threads: 8,
            ..Default::default()
        };
        run_args.apply_to(&mut config);

        assert!(!config.parallelize_test_collections);
        assert!(!config.parallelize_assemblies);
        assert_eq!(config.max_parallel_threads, 8);
        assert_eq!(config.phase_timeout_secs, Some(30));
        assert!(config.teamcity);
    }

    #[test]
    fn test_config_init_and_globals() {
        let args = Args::parse_from(["testrun", "config", "init", "my.yaml", "-v"]);
        assert!(args.verbose);
        match args.command {
            Command::Config {
                action: ConfigAction::Init { path, force },
            } => {
                assert_eq!(path, Some(PathBuf::from("my.yaml")));
                assert!(!force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }

    #[test]
    fn test_invalid_job_spec() {
        assert!(parse_jobs(&[",only-config.json".to_string()]).is_err());
    }
}
