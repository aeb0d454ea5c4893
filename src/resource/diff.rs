//! Resource Differ
//!
//! Compares what the configuration defines with what exists on AWS.

use std::collections::BTreeSet;

/// Result of comparing a defined set with an existing set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff<T: Ord> {
    /// Defined but not existing: to be created
    pub missing: BTreeSet<T>,
    /// Existing but no longer defined: candidates for cleanup
    pub stale: BTreeSet<T>,
}

impl<T: Ord + Clone> Diff<T> {
    pub fn between(defined: &BTreeSet<T>, existing: &BTreeSet<T>) -> Self {
        Self {
            missing: defined.difference(existing).cloned().collect(),
            stale: existing.difference(defined).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_and_stale() {
        let diff = Diff::between(&set(&["a", "b"]), &set(&["a", "c"]));
        assert_eq!(diff.missing, set(&["b"]));
        assert_eq!(diff.stale, set(&["c"]));
    }

    #[test]
    fn test_identical_sets() {
        let diff = Diff::between(&set(&["a", "b"]), &set(&["b", "a"]));
        assert!(diff.missing.is_empty());
        assert!(diff.stale.is_empty());
    }

    #[test]
    fn test_pair_keys() {
        let defined: BTreeSet<(String, String)> =
            [("service/c/a".to_string(), "up".to_string())].into();
        let existing: BTreeSet<(String, String)> = [
            ("service/c/a".to_string(), "up".to_string()),
            ("service/c/a".to_string(), "down".to_string()),
        ]
        .into();

        let diff = Diff::between(&defined, &existing);
        assert!(diff.missing.is_empty());
        assert_eq!(diff.stale.len(), 1);
        assert!(diff
            .stale
            .contains(&("service/c/a".to_string(), "down".to_string())));
    }
}
