//! Property-based tests for the Levenshtein implementation.

use proptest::prelude::*;

use clarity_metrics::{edit_distance, normalized_levenshtein};

fn text() -> impl Strategy<Value = String> {
    // Mixed ASCII, CJK, and emoji so code-point handling is exercised.
    proptest::string::string_regex("[a-z 肺野清明\u{1F327}\u{2600}]{0,24}").unwrap()
}

proptest! {
    /// Distance is symmetric.
    #[test]
    fn distance_is_symmetric(a in text(), b in text()) {
        prop_assert_eq!(edit_distance(&a, &b), edit_distance(&b, &a));
    }

    /// Distance to self is zero; distance to empty is the length.
    #[test]
    fn identity_and_empty_bounds(a in text()) {
        prop_assert_eq!(edit_distance(&a, &a), 0);
        prop_assert_eq!(edit_distance(&a, ""), a.chars().count());
    }

    /// Distance never exceeds the longer input's code-point length.
    #[test]
    fn distance_is_bounded_by_longer_length(a in text(), b in text()) {
        let bound = a.chars().count().max(b.chars().count());
        prop_assert!(edit_distance(&a, &b) <= bound);
    }

    /// Triangle inequality over three arbitrary strings.
    #[test]
    fn triangle_inequality(a in text(), b in text(), c in text()) {
        prop_assert!(
            edit_distance(&a, &c) <= edit_distance(&a, &b) + edit_distance(&b, &c)
        );
    }

    /// Normalized distance stays in [0, 1] and is zero only for equal
    /// inputs.
    #[test]
    fn normalization_bounds(a in text(), b in text()) {
        let d = normalized_levenshtein(&a, &b);
        prop_assert!((0.0..=1.0).contains(&d));
        if a == b {
            prop_assert_eq!(d, 0.0);
        } else {
            prop_assert!(d > 0.0);
        }
    }

    /// Appending one character moves normalized distance by exactly
    /// 1 / (len + 1) against the original.
    #[test]
    fn single_append_distance(a in "[a-z]{1,20}") {
        let longer = format!("{a}.");
        let expected = 1.0 / longer.chars().count() as f64;
        prop_assert!((normalized_levenshtein(&a, &longer) - expected).abs() < 1e-12);
    }
}
