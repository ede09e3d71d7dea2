//! Summary table formatting

use std::collections::BTreeMap;

use crate::models::{ExecutionSummary, TestCase};

const GRAND_TOTAL: &str = "GRAND TOTAL:";

/// Column-aligned per-assembly summary
///
/// Rows are sorted by assembly name. A grand total row follows only when
/// more than one assembly ran; column widths cover every row including it.
pub struct SummaryTable<'a> {
    summaries: &'a BTreeMap<String, ExecutionSummary>,
}

struct Widths {
    name: usize,
    total: usize,
    failed: usize,
    skipped: usize,
    time: usize,
}

fn format_time(seconds: f64) -> String {
    format!("{seconds:.3}s")
}

impl<'a> SummaryTable<'a> {
    pub fn new(summaries: &'a BTreeMap<String, ExecutionSummary>) -> Self {
        Self { summaries }
    }

    fn grand_total(&self) -> Option<ExecutionSummary> {
        (self.summaries.len() > 1).then(|| ExecutionSummary::sum(self.summaries.values()))
    }

    fn widths(&self, grand_total: Option<&ExecutionSummary>) -> Widths {
        let mut widths = Widths {
            name: grand_total.map_or(0, |_| GRAND_TOTAL.len()),
            total: 0,
            failed: 0,
            skipped: 0,
            time: 0,
        };

        let rows = self
            .summaries
            .iter()
            .map(|(name, s)| (name.len(), s))
            .chain(grand_total.map(|s| (0, s)));

        for (name_len, summary) in rows {
            widths.name = widths.name.max(name_len);
            widths.total = widths.total.max(summary.total.to_string().len());
            widths.failed = widths.failed.max(summary.failed.to_string().len());
            widths.skipped = widths.skipped.max(summary.skipped.to_string().len());
            widths.time = widths.time.max(format_time(summary.time).len());
        }

        widths
    }

    fn row(name: &str, summary: &ExecutionSummary, w: &Widths, right_align_name: bool) -> String {
        let name = if right_align_name {
            format!("{:>width$}", name, width = w.name)
        } else {
            format!("{:<width$}", name, width = w.name)
        };

        format!(
            "   {}  Total: {:>tw$}, Failed: {:>fw$}, Skipped: {:>sw$}, Time: {:>timew$}",
            name,
            summary.total,
            summary.failed,
            summary.skipped,
            format_time(summary.time),
            tw = w.total,
            fw = w.failed,
            sw = w.skipped,
            timew = w.time,
        )
    }

    /// Render the table, one string per line
    pub fn lines(&self) -> Vec<String> {
        let grand_total = self.grand_total();
        let w = self.widths(grand_total.as_ref());

        let mut lines: Vec<String> = self
            .summaries
            .iter()
            .map(|(name, summary)| Self::row(name, summary, &w, false))
            .collect();

        if let Some(total) = grand_total {
            lines.push(format!(
                "   {}         {}          {}           {}        {}",
                " ".repeat(w.name),
                "-".repeat(w.total),
                "-".repeat(w.failed),
                "-".repeat(w.skipped),
                "-".repeat(w.time)
            ));
            lines.push(Self::row(GRAND_TOTAL, &total, &w, true));
        }

        lines
    }
}

/// Render discovered test cases for the `list` command
pub fn format_test_listing(assembly: &str, test_cases: &[TestCase]) -> String {
    let mut output = format!("{} ({} tests)\n", assembly, test_cases.len());
    for test_case in test_cases {
        output.push_str(&format!("  {test_case}"));
        if !test_case.traits.is_empty() {
            output.push_str(&format!(" {{{}}}", test_case.traits));
        }
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summaries(entries: &[(&str, ExecutionSummary)]) -> BTreeMap<String, ExecutionSummary> {
        entries
            .iter()
            .map(|(name, s)| (name.to_string(), *s))
            .collect()
    }

    #[test]
    fn test_two_assemblies_with_grand_total() {
        let map = summaries(&[
            ("B", ExecutionSummary::new(5, 0, 2, 0.5)),
            ("A", ExecutionSummary::new(10, 1, 0, 1.234)),
        ]);

        let lines = SummaryTable::new(&map).lines();
        assert_eq!(
            lines,
            vec![
                "   A             Total: 10, Failed: 1, Skipped: 0, Time: 1.234s",
                "   B             Total:  5, Failed: 0, Skipped: 2, Time: 0.500s",
                "                        --          -           -        ------",
                "   GRAND TOTAL:  Total: 15, Failed: 1, Skipped: 2, Time: 1.734s",
            ]
        );
    }

    #[test]
    fn test_single_assembly_has_no_grand_total() {
        let map = summaries(&[("Only", ExecutionSummary::new(3, 0, 0, 0.05))]);
        let lines = SummaryTable::new(&map).lines();
        assert_eq!(
            lines,
            vec!["   Only  Total: 3, Failed: 0, Skipped: 0, Time: 0.050s"]
        );
    }

    #[test]
    fn test_grand_total_widens_columns() {
        let map = summaries(&[
            ("a", ExecutionSummary::new(9, 0, 0, 9.0)),
            ("b", ExecutionSummary::new(9, 0, 0, 1.0)),
        ]);
        let lines = SummaryTable::new(&map).lines();
        assert!(lines[0].contains("Total:  9,"));
        assert!(lines[3].contains("Total: 18"));
        assert!(lines[3].ends_with("Time: 10.000s"));
        assert!(lines[0].ends_with("Time:  9.000s"));
    }

    #[test]
    fn test_empty_table() {
        let map = BTreeMap::new();
        assert!(SummaryTable::new(&map).lines().is_empty());
    }

    #[test]
    fn test_listing() {
        let cases = vec![
            TestCase::new("m::a", "a", "m").with_trait("kind", "unit"),
            TestCase::new("m::b", "b", "m"),
        ];
        let listing = format_test_listing("math", &cases);
        assert_eq!(listing, "math (2 tests)\n  a [m] {kind=unit}\n  b [m]\n");
    }
}
