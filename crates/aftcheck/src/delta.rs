//! Changed next-hop detection between two counter snapshots.

use crate::types::{index_order, CounterSnapshot};
use itertools::Itertools;

/// Returns the indices whose count grew from `pre` to `post`.
///
/// Considers the union of both snapshots with absent keys read as zero.
/// The result is sorted numerically.
pub fn find_changed(pre: &CounterSnapshot, post: &CounterSnapshot) -> Vec<String> {
    pre.iter()
        .chain(post.iter())
        .map(|(index, _)| index)
        .unique()
        .filter(|index| post.get(index) > pre.get(index))
        .map(str::to_string)
        .sorted_by(|a, b| index_order(a, b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn snapshot(entries: &[(&str, u64)]) -> CounterSnapshot {
        entries.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_new_and_incremented_indices() {
        let pre = snapshot(&[("1", 100), ("2", 50)]);
        let post = snapshot(&[("1", 150), ("2", 50), ("3", 10)]);
        assert_eq!(find_changed(&pre, &post), vec!["1", "3"]);
    }

    #[test]
    fn test_decrease_and_disappearance_are_not_changes() {
        let pre = snapshot(&[("1", 100), ("2", 50)]);
        let post = snapshot(&[("1", 90)]);
        assert!(find_changed(&pre, &post).is_empty());
    }

    #[test]
    fn test_zero_to_zero_is_unchanged() {
        let pre = snapshot(&[("4", 0)]);
        let post = snapshot(&[("4", 0), ("5", 0)]);
        assert!(find_changed(&pre, &post).is_empty());
    }

    #[test]
    fn test_membership_matches_definition() {
        let pre = snapshot(&[("1", 5), ("2", 7), ("10", 0)]);
        let post = snapshot(&[("1", 6), ("2", 7), ("11", 1)]);
        let changed = find_changed(&pre, &post);
        for index in ["1", "2", "10", "11"] {
            assert_eq!(
                changed.iter().any(|c| c == index),
                post.get(index) > pre.get(index),
                "index {}",
                index
            );
        }
        assert_eq!(changed, vec!["1", "11"]);
    }
}
