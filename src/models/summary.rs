//! Execution summary models
//!
//! Per-assembly counts, the overall exit status and the aggregate run
//! result handed back by the coordinator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::results::ReportNode;

/// Counts and elapsed time for one assembly
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total: u32,
    pub failed: u32,
    pub skipped: u32,
    /// Elapsed execution time in seconds
    pub time: f64,
}

impl ExecutionSummary {
    pub fn new(total: u32, failed: u32, skipped: u32, time: f64) -> Self {
        Self {
            total,
            failed,
            skipped,
            time,
        }
    }

    pub fn passed(&self) -> u32 {
        self.total.saturating_sub(self.failed + self.skipped)
    }

    /// Sum a set of summaries into one grand total.
    pub fn sum<'a>(summaries: impl IntoIterator<Item = &'a ExecutionSummary>) -> Self {
        summaries
            .into_iter()
            .fold(Self::default(), |acc, s| Self {
                total: acc.total + s.total,
                failed: acc.failed + s.failed,
                skipped: acc.skipped + s.skipped,
                time: acc.time + s.time,
            })
    }
}

impl fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {}, Failed: {}, Skipped: {}, Time: {:.3}s",
            self.total, self.failed, self.skipped, self.time
        )
    }
}

/// Overall outcome of a run.
///
/// Ordered by severity so statuses merge with `max`: a fatal job failure
/// overrides ordinary test failures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    #[default]
    Success,
    TestsFailed,
    Fatal,
}

impl ExitStatus {
    /// Process exit code: 0, 1, or -1 for a run that could not complete.
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::TestsFailed => 1,
            ExitStatus::Fatal => -1,
        }
    }

    pub fn merge(self, other: ExitStatus) -> ExitStatus {
        self.max(other)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Success => write!(f, "SUCCESS"),
            ExitStatus::TestsFailed => write!(f, "TESTS FAILED"),
            ExitStatus::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Aggregate result of one coordinator invocation
#[derive(Clone, Debug, Default)]
pub struct RunResult {
    /// Summaries keyed by assembly display name
    pub per_assembly: BTreeMap<String, ExecutionSummary>,
    /// Report fragments in job submission order
    pub fragments: Vec<ReportNode>,
    pub exit_status: ExitStatus,
}

impl RunResult {
    pub fn exit_code(&self) -> i32 {
        self.exit_status.code()
    }

    /// True when nothing was executed (e.g. cancelled before any job began).
    pub fn is_empty(&self) -> bool {
        self.per_assembly.is_empty()
    }

    pub fn grand_total(&self) -> ExecutionSummary {
        ExecutionSummary::sum(self.per_assembly.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_merge() {
        assert_eq!(
            ExitStatus::Success.merge(ExitStatus::TestsFailed),
            ExitStatus::TestsFailed
        );
        assert_eq!(
            ExitStatus::Fatal.merge(ExitStatus::TestsFailed),
            ExitStatus::Fatal
        );
        assert_eq!(ExitStatus::TestsFailed.merge(ExitStatus::Fatal).code(), -1);
        assert_eq!(ExitStatus::default().code(), 0);
    }

    #[test]
    fn test_summary_sum() {
        let a = ExecutionSummary::new(10, 1, 0, 1.234);
        let b = ExecutionSummary::new(5, 0, 2, 0.5);

        let total = ExecutionSummary::sum([&a, &b]);
        assert_eq!(total.total, 15);
        assert_eq!(total.failed, 1);
        assert_eq!(total.skipped, 2);
        assert!((total.time - 1.734).abs() < 1e-9);
        assert_eq!(b.passed(), 3);
    }

    #[test]
    fn test_summary_display() {
        let s = ExecutionSummary::new(3, 1, 1, 0.25);
        assert_eq!(s.to_string(), "Total: 3, Failed: 1, Skipped: 1, Time: 0.250s");
    }
}
