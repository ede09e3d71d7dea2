//! Console output
//!
//! Live reporters for engine messages and the end-of-run summary table.

mod formatter;
mod reporter;

pub use formatter::{format_test_listing, SummaryTable};
pub use reporter::{ConsoleReporter, StandardReporter, TeamCityReporter};
