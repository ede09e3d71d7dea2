//! Trait list parsing
//!
//! Parses `name=value;name=value` input into a [`Traits`] multimap.
//! Malformed entries are reported back as warnings and skipped.

use crate::models::Traits;

const PAIR_SEPARATOR: char = ';';
const VALUE_SEPARATOR: char = '=';

/// Parser for delimited trait lists
#[derive(Clone, Copy, Debug, Default)]
pub struct TraitParser;

impl TraitParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse `input` into `traits`, returning one warning per ignored entry.
    pub fn parse(&self, input: Option<&str>, traits: &mut Traits) -> Vec<String> {
        let mut warnings = Vec::new();

        let Some(input) = input else {
            return warnings;
        };

        for entry in input.split(PAIR_SEPARATOR) {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            match parse_pair(entry) {
                Some((name, value)) => traits.add(name, value),
                None => warnings.push(format!(
                    "Invalid trait '{entry}'. The format should be 'name=value'. This trait will be ignored."
                )),
            }
        }

        warnings
    }
}

fn parse_pair(entry: &str) -> Option<(&str, &str)> {
    let mut parts = entry.split(VALUE_SEPARATOR);
    let name = parts.next()?.trim();
    let value = parts.next()?.trim();

    if parts.next().is_some() || name.is_empty() || value.is_empty() {
        return None;
    }

    Some((name, value))
}
