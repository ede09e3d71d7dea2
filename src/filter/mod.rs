//! Test case filtering
//!
//! Include/exclude predicates over test case traits, plus parsing of the
//! delimited `name=value;name=value` trait syntax.

mod filters;
mod traits;

pub use filters::Filter;
pub use traits::TraitParser;
