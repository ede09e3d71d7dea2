//! Trait-based test case filter

use tracing::warn;

use super::TraitParser;
use crate::models::{TestCase, Traits};

/// Immutable include/exclude predicate over test case traits.
///
/// Exclusion always wins. With an empty include set every case that is
/// not excluded passes; otherwise a case must carry at least one
/// included trait.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    included: Traits,
    excluded: Traits,
}

impl Filter {
    pub fn new(included: Traits, excluded: Traits) -> Self {
        Self { included, excluded }
    }

    /// Build a filter from delimited trait strings.
    ///
    /// Malformed entries are logged as warnings and the filter is built
    /// from whatever parsed.
    pub fn from_trait_strings(include: Option<&str>, exclude: Option<&str>) -> Self {
        let parser = TraitParser::new();
        let mut included = Traits::new();
        let mut excluded = Traits::new();

        let warnings = parser
            .parse(include, &mut included)
            .into_iter()
            .chain(parser.parse(exclude, &mut excluded));

        for warning in warnings {
            warn!("{}", warning);
        }

        Self::new(included, excluded)
    }

    pub fn included(&self) -> &Traits {
        &self.included
    }

    pub fn excluded(&self) -> &Traits {
        &self.excluded
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty() && self.excluded.is_empty()
    }

    pub fn matches(&self, test_case: &TestCase) -> bool {
        if test_case.traits.intersects(&self.excluded) {
            return false;
        }

        self.included.is_empty() || test_case.traits.intersects(&self.included)
    }

    /// Keep matching cases, preserving their order.
    pub fn apply(&self, test_cases: Vec<TestCase>) -> Vec<TestCase> {
        test_cases.into_iter().filter(|tc| self.matches(tc)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(id: &str, traits: &[(&str, &str)]) -> TestCase {
        traits
            .iter()
            .fold(TestCase::new(id, id, "c"), |tc, (n, v)| tc.with_trait(*n, *v))
    }

    #[test]
    fn test_empty_filter_passes_everything() {
        let filter = Filter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&case("a", &[])));
        assert!(filter.matches(&case("b", &[("x", "y")])));
    }

    #[test]
    fn test_exclusion_wins_over_inclusion() {
        let filter = Filter::new(
            Traits::new().with("category", "fast"),
            Traits::new().with("flaky", "true"),
        );

        assert!(filter.matches(&case("a", &[("category", "fast")])));
        assert!(!filter.matches(&case("b", &[("category", "fast"), ("flaky", "true")])));
        assert!(!filter.matches(&case("c", &[("flaky", "TRUE")])));
    }

    #[test]
    fn test_include_requires_at_least_one_match() {
        let filter = Filter::new(
            Traits::new().with("category", "fast").with("area", "net"),
            Traits::new(),
        );

        assert!(filter.matches(&case("a", &[("area", "net")])));
        assert!(!filter.matches(&case("b", &[("area", "disk")])));
        assert!(!filter.matches(&case("c", &[])));
    }

    #[test]
    fn test_exclude_only() {
        let filter = Filter::new(Traits::new(), Traits::new().with("slow", "yes"));
        assert!(filter.matches(&case("a", &[])));
        assert!(!filter.matches(&case("b", &[("slow", "yes")])));
    }

    #[test]
    fn test_apply_preserves_order() {
        let filter = Filter::from_trait_strings(None, Some("skip=me"));
        let cases = vec![
            case("3", &[]),
            case("1", &[("skip", "me")]),
            case("2", &[]),
            case("0", &[]),
        ];

        let ids: Vec<_> = filter
            .apply(cases)
            .into_iter()
            .map(|tc| tc.unique_id)
            .collect();
        assert_eq!(ids, vec!["3", "2", "0"]);
    }

    #[test]
    fn test_malformed_input_is_best_effort() {
        let filter = Filter::from_trait_strings(Some("broken;kind=unit"), None);
        assert!(filter.included().contains("kind", "unit"));
        assert_eq!(filter.included().pairs().count(), 1);
    }
}
