//! Test case models
//!
//! A `TestCase` is the handle the engine hands out during discovery and
//! takes back for execution. The runner only inspects its traits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Multimap of trait name to values.
///
/// Names and values compare case-insensitively; the original spelling is
/// kept for display.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Traits(BTreeMap<String, Vec<String>>);

impl Traits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value under `name`, ignoring exact duplicates.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        let key = self
            .0
            .keys()
            .find(|k| k.eq_ignore_ascii_case(&name))
            .cloned()
            .unwrap_or(name);

        let values = self.0.entry(key).or_default();
        if !values.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
            values.push(value);
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(name, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|v| v.is_empty())
    }

    /// Iterate over every (name, value) pair.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }

    pub fn contains(&self, name: &str, value: &str) -> bool {
        self.pairs()
            .any(|(n, v)| n.eq_ignore_ascii_case(name) && v.eq_ignore_ascii_case(value))
    }

    /// True when at least one (name, value) pair is present in both maps.
    pub fn intersects(&self, other: &Traits) -> bool {
        self.pairs().any(|(n, v)| other.contains(n, v))
    }
}

impl fmt::Display for Traits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.pairs().map(|(n, v)| format!("{n}={v}")).collect();
        write!(f, "{}", pairs.join(";"))
    }
}

/// Location of a test in its source file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub file: String,
    pub line: Option<u32>,
}

/// A discovered test case
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Identifier the engine uses to find the test again at execution time
    pub unique_id: String,
    pub display_name: String,
    pub collection: String,
    #[serde(default, skip_serializing_if = "Traits::is_empty")]
    pub traits: Traits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
}

impl TestCase {
    pub fn new(
        unique_id: impl Into<String>,
        display_name: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            unique_id: unique_id.into(),
            display_name: display_name.into(),
            collection: collection.into(),
            traits: Traits::new(),
            source: None,
        }
    }

    pub fn with_trait(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.traits = self.traits.with(name, value);
        self
    }

    pub fn with_source(mut self, source: SourceInfo) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.display_name, self.collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traits_case_insensitive() {
        let traits = Traits::new()
            .with("Category", "Fast")
            .with("category", "fast")
            .with("category", "Slow");

        assert!(traits.contains("CATEGORY", "fast"));
        assert_eq!(traits.pairs().count(), 2);
        assert_eq!(traits.to_string(), "Category=Fast;Category=Slow");
    }

    #[test]
    fn test_traits_intersects() {
        let case = Traits::new().with("area", "net").with("speed", "slow");
        let include = Traits::new().with("speed", "SLOW");
        let other = Traits::new().with("area", "disk");

        assert!(case.intersects(&include));
        assert!(!case.intersects(&other));
        assert!(!case.intersects(&Traits::new()));
    }

    #[test]
    fn test_case_builder() {
        let case = TestCase::new("math::adds", "adds", "math").with_trait("kind", "unit");
        assert_eq!(case.to_string(), "adds [math]");
        assert!(case.traits.contains("kind", "unit"));
    }
}
