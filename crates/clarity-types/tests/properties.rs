//! Property-based tests for the types crate.

use proptest::prelude::*;

use clarity_types::probe::RegionMask;
use clarity_types::{ExtractedAnswer, PERTURBATION_KINDS, PerturbationKind, encode_axis_value};

fn finite_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        -100.0..100.0f64,
        prop::sample::select(vec![0.0, 0.8, 1.0, 1.2, -0.5, 42.0]),
    ]
}

proptest! {
    /// Encoding any finite value succeeds and never emits a path separator
    /// or a dot.
    #[test]
    fn encoding_is_total_and_directory_safe(value in finite_value()) {
        let encoded = encode_axis_value(value).unwrap();
        prop_assert!(!encoded.is_empty());
        prop_assert!(!encoded.contains('.'));
        prop_assert!(!encoded.contains('-'));
        prop_assert!(!encoded.contains('/'));
    }

    /// Distinct short-decimal values get distinct encodings.
    #[test]
    fn encoding_is_injective_on_declared_grids(a in 0u32..400, b in 0u32..400) {
        let va = f64::from(a) / 100.0;
        let vb = f64::from(b) / 100.0;
        if a != b {
            prop_assert_ne!(
                encode_axis_value(va).unwrap(),
                encode_axis_value(vb).unwrap()
            );
        }
    }

    /// from_str never panics on arbitrary input.
    #[test]
    fn kind_from_str_never_panics(name in "[a-z]{0,12}") {
        let parsed = PerturbationKind::from_str(&name);
        if let Some(kind) = parsed {
            prop_assert!(PERTURBATION_KINDS.contains(&kind));
        }
    }

    /// Grid cell masks always stay inside the unit square.
    #[test]
    fn grid_cells_stay_normalized(k in 1usize..9, row in 0usize..8, col in 0usize..8) {
        prop_assume!(row < k && col < k);
        let mask = RegionMask::grid_cell(row, col, k);
        prop_assert!(mask.x_min >= 0.0 && mask.x_max <= 1.0);
        prop_assert!(mask.y_min >= 0.0 && mask.y_max <= 1.0);
        prop_assert!(mask.x_min < mask.x_max);
        prop_assert!(mask.y_min < mask.y_max);
    }

    /// Extraction is a total function of arbitrary JSON records.
    #[test]
    fn extraction_never_panics(key in "[a-z_]{1,10}", text in ".{0,20}") {
        let record = serde_json::json!({ key: text });
        let _ = ExtractedAnswer::from_record(&record);
    }
}
