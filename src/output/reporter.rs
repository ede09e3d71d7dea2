//! Live console reporters
//!
//! The execution visitor forwards every engine message to one reporter,
//! chosen by configuration.

use tracing::{debug, error, info, warn};

use crate::engine::EngineMessage;

/// Receives engine messages for console display
pub trait ConsoleReporter: Send + Sync {
    fn on_message(&self, assembly: &str, message: &EngineMessage);
}

/// Standard log output: failures always, passes and skips when verbose
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardReporter {
    verbose: bool,
}

impl StandardReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ConsoleReporter for StandardReporter {
    fn on_message(&self, assembly: &str, message: &EngineMessage) {
        match message {
            EngineMessage::AssemblyStarting { .. } => info!("Starting:    {}", assembly),
            EngineMessage::TestPassed { test_case, .. } if self.verbose => {
                info!("    {} [PASS]", test_case.display_name)
            }
            EngineMessage::TestFailed {
                test_case,
                message,
                stack_trace,
                output,
                ..
            } => {
                error!("    {} [FAIL]", test_case.display_name);
                for line in message.lines() {
                    error!("      {}", line);
                }
                for line in stack_trace.iter().flat_map(|s| s.lines()) {
                    error!("      {}", line);
                }
                if self.verbose {
                    for line in output.lines() {
                        info!("      {}", line);
                    }
                }
            }
            EngineMessage::TestSkipped { test_case, reason } => {
                warn!("    {} [SKIP]", test_case.display_name);
                warn!("      {}", reason);
            }
            EngineMessage::AssemblyFinished { .. } => info!("Finished:    {}", assembly),
            EngineMessage::Diagnostic(text) => debug!("[{}] {}", assembly, text),
            _ => {}
        }
    }
}

/// TeamCity service messages on stdout
#[derive(Clone, Copy, Debug, Default)]
pub struct TeamCityReporter;

impl TeamCityReporter {
    pub fn new() -> Self {
        Self
    }

    /// Service messages for one engine message
    pub fn format(&self, assembly: &str, message: &EngineMessage) -> Vec<String> {
        let suite = escape(assembly);

        match message {
            EngineMessage::AssemblyStarting { .. } => vec![format!(
                "##teamcity[testSuiteStarted name='{suite}' flowId='{suite}']"
            )],
            EngineMessage::TestPassed {
                test_case, time, ..
            } => {
                let flow = escape(&format!("{}::{}", assembly, test_case.collection));
                let name = escape(&test_case.display_name);
                vec![
                    format!("##teamcity[testStarted name='{name}' flowId='{flow}']"),
                    format!(
                        "##teamcity[testFinished name='{name}' duration='{}' flowId='{flow}']",
                        millis(*time)
                    ),
                ]
            }
            EngineMessage::TestFailed {
                test_case,
                time,
                message,
                stack_trace,
                ..
            } => {
                let flow = escape(&format!("{}::{}", assembly, test_case.collection));
                let name = escape(&test_case.display_name);
                let details = match stack_trace {
                    Some(trace) => format!("{message}\n{trace}"),
                    None => message.clone(),
                };
                vec![
                    format!("##teamcity[testStarted name='{name}' flowId='{flow}']"),
                    format!(
                        "##teamcity[testFailed name='{name}' details='{}' flowId='{flow}']",
                        escape(&details)
                    ),
                    format!(
                        "##teamcity[testFinished name='{name}' duration='{}' flowId='{flow}']",
                        millis(*time)
                    ),
                ]
            }
            EngineMessage::TestSkipped { test_case, reason } => {
                let flow = escape(&format!("{}::{}", assembly, test_case.collection));
                vec![format!(
                    "##teamcity[testIgnored name='{}' message='{}' flowId='{flow}']",
                    escape(&test_case.display_name),
                    escape(reason)
                )]
            }
            EngineMessage::AssemblyFinished { .. } | EngineMessage::EngineFailed(_) => vec![format!(
                "##teamcity[testSuiteFinished name='{suite}' flowId='{suite}']"
            )],
            _ => Vec::new(),
        }
    }
}

impl ConsoleReporter for TeamCityReporter {
    fn on_message(&self, assembly: &str, message: &EngineMessage) {
        for line in self.format(assembly, message) {
            println!("{line}");
        }
    }
}

fn millis(seconds: f64) -> u64 {
    (seconds * 1000.0).round() as u64
}

/// TeamCity service message value escaping
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '|' => escaped.push_str("||"),
            '\'' => escaped.push_str("|'"),
            '\n' => escaped.push_str("|n"),
            '\r' => escaped.push_str("|r"),
            '[' => escaped.push_str("|["),
            ']' => escaped.push_str("|]"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestCase;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a|b'c\n[d]"), "a||b|'c|n|[d|]");
    }

    #[test]
    fn test_teamcity_failure_messages() {
        let message = EngineMessage::TestFailed {
            test_case: TestCase::new("m::divides", "divides", "math"),
            time: 0.25,
            message: "exit 1".to_string(),
            stack_trace: None,
            output: String::new(),
        };

        let lines = TeamCityReporter::new().format("suite", &message);
        assert_eq!(
            lines,
            vec![
                "##teamcity[testStarted name='divides' flowId='suite::math']",
                "##teamcity[testFailed name='divides' details='exit 1' flowId='suite::math']",
                "##teamcity[testFinished name='divides' duration='250' flowId='suite::math']",
            ]
        );
    }

    #[test]
    fn test_teamcity_suite_and_skip() {
        let reporter = TeamCityReporter::new();
        let finished = EngineMessage::AssemblyFinished {
            total: 0,
            failed: 0,
            skipped: 0,
            time: 0.0,
        };
        assert_eq!(
            reporter.format("suite", &finished),
            vec!["##teamcity[testSuiteFinished name='suite' flowId='suite']"]
        );

        let skipped = EngineMessage::TestSkipped {
            test_case: TestCase::new("m::x", "x", "m"),
            reason: "it's slow".to_string(),
        };
        assert_eq!(
            reporter.format("suite", &skipped),
            vec!["##teamcity[testIgnored name='x' message='it|'s slow' flowId='suite::m']"]
        );
        assert!(reporter
            .format("suite", &EngineMessage::DiscoveryComplete)
            .is_empty());
    }
}
