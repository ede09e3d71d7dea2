//! Cause-chain reporting for jobs that could not run

use std::backtrace::BacktraceStatus;
use std::error::Error;
use tracing::error;

use crate::error::RunnerError;

/// Best-effort type name for one link of an error chain
fn error_type_name(cause: &(dyn Error + 'static)) -> &'static str {
    if let Some(err) = cause.downcast_ref::<RunnerError>() {
        err.kind()
    } else if cause.is::<std::io::Error>() {
        "std::io::Error"
    } else if cause.is::<serde_yaml::Error>() {
        "serde_yaml::Error"
    } else if cause.is::<serde_json::Error>() {
        "serde_json::Error"
    } else if cause.is::<tokio::task::JoinError>() {
        "tokio::task::JoinError"
    } else {
        "error"
    }
}

/// One `type: message` line per link of the chain, outermost first
pub fn cause_chain(err: &anyhow::Error) -> Vec<String> {
    err.chain()
        .map(|cause| format!("{}: {}", error_type_name(cause), cause))
        .collect()
}

fn backtrace_lines(err: &anyhow::Error) -> Vec<String> {
    let backtrace = err.backtrace();
    if backtrace.status() != BacktraceStatus::Captured {
        return Vec::new();
    }
    backtrace
        .to_string()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Log every cause of `err`, then its backtrace when one was captured
pub fn log_failure(assembly: &str, err: &anyhow::Error) {
    error!("{}: could not run tests", assembly);
    for line in cause_chain(err) {
        error!("{}", line);
    }
    for line in backtrace_lines(err) {
        error!("{}", line);
    }
}
