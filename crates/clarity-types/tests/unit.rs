//! Unit tests for `clarity-types` value encoding, answer extraction, and
//! serde field shapes.

use clarity_types::overlay::EvidenceMap;
use clarity_types::probe::RegionMask;
use clarity_types::{
    AdapterResponse, BASELINE_AXIS, ExtractedAnswer, PERTURBATION_KINDS, PerturbationKind,
    TraceRecord, encode_axis_value, extract_justification,
};

// ── Axis value encoding ─────────────────────────────────────────────────────

#[test]
fn encoding_replaces_dot_with_p() {
    assert_eq!(encode_axis_value(1.2).unwrap(), "1p2");
    assert_eq!(encode_axis_value(0.75).unwrap(), "0p75");
}

#[test]
fn whole_values_keep_one_fractional_digit() {
    assert_eq!(encode_axis_value(3.0).unwrap(), "3p0");
    assert_eq!(encode_axis_value(10.0).unwrap(), "10p0");
}

#[test]
fn negative_values_use_m_prefix() {
    assert_eq!(encode_axis_value(-1.5).unwrap(), "m1p5");
}

#[test]
fn encoded_values_are_directory_safe() {
    for value in [0.8, 1.0, 1.2, -0.5, 12.345, 0.0] {
        let encoded = encode_axis_value(value).unwrap();
        assert!(
            encoded
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == 'p' || c == 'm'),
            "unsafe character in '{encoded}'"
        );
    }
}

// ── Perturbation kinds ──────────────────────────────────────────────────────

#[test]
fn kind_roundtrips_through_names() {
    for kind in PerturbationKind::all() {
        assert_eq!(PerturbationKind::from_str(kind.as_str()), Some(*kind));
    }
}

#[test]
fn from_str_rejects_unknown_and_case_variants() {
    assert_eq!(PerturbationKind::from_str("Brightness"), None);
    assert_eq!(PerturbationKind::from_str(""), None);
    assert_eq!(PerturbationKind::from_str("sharpen"), None);
    assert_eq!(PerturbationKind::from_str(BASELINE_AXIS), None);
}

#[test]
fn serde_names_match_as_str() {
    for kind in PERTURBATION_KINDS {
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, format!("\"{}\"", kind.as_str()));
    }
}

// ── Answer and justification extraction ─────────────────────────────────────

#[test]
fn from_output_wins_when_both_present() {
    let record = serde_json::json!({"step_id": 9, "output": "stable", "answer": "legacy"});
    let extracted = ExtractedAnswer::from_record(&record);
    assert_eq!(extracted.as_text(), Some("stable"));
    assert!(matches!(extracted, ExtractedAnswer::FromOutput(_)));
}

#[test]
fn non_string_output_falls_through_to_answer() {
    let record = serde_json::json!({"step_id": 9, "output": 7, "answer": "fallback"});
    assert!(matches!(
        ExtractedAnswer::from_record(&record),
        ExtractedAnswer::FromAnswer(_)
    ));
}

#[test]
fn missing_answer_is_explicit() {
    let record = serde_json::json!({"step": 0});
    let extracted = ExtractedAnswer::from_record(&record);
    assert_eq!(extracted, ExtractedAnswer::Missing);
    assert_eq!(extracted.as_text(), None);
}

#[test]
fn justification_coerces_non_strings() {
    let record = serde_json::json!({"justification": 3.5});
    assert_eq!(extract_justification(&record), "3.5");
    let record = serde_json::json!({"justification": {"note": "x"}});
    assert_eq!(extract_justification(&record), "{\"note\":\"x\"}");
}

#[test]
fn absent_justification_is_empty_not_error() {
    let record = serde_json::json!({"step_id": 0});
    assert_eq!(extract_justification(&record), "");
    let record = serde_json::json!({"justification": null});
    assert_eq!(extract_justification(&record), "");
}

// ── Trace records ───────────────────────────────────────────────────────────

#[test]
fn bare_step_record_serializes_without_optional_fields() {
    let record = TraceRecord::step(4);
    let json = serde_json::to_string(&record).unwrap();
    assert_eq!(json, "{\"step_id\":4}");
}

// ── Response text splitting ─────────────────────────────────────────────────

#[test]
fn single_line_text_has_empty_justification() {
    let response = AdapterResponse {
        text: "normal".into(),
        rich: None,
    };
    assert_eq!(response.split_text(), ("normal".into(), String::new()));
}

#[test]
fn multi_line_justification_is_preserved() {
    let response = AdapterResponse {
        text: "opacity\nleft lower lobe\nno effusion".into(),
        rich: None,
    };
    let (answer, justification) = response.split_text();
    assert_eq!(answer, "opacity");
    assert_eq!(justification, "left lower lobe\nno effusion");
}

// ── Region masks and evidence maps ──────────────────────────────────────────

#[test]
fn grid_cell_covers_expected_rectangle() {
    let mask = RegionMask::grid_cell(1, 2, 3);
    assert_eq!(mask.region_id, "grid_r1_c2_k3");
    assert!((mask.x_min - 2.0 / 3.0).abs() < 1e-12);
    assert!((mask.x_max - 1.0).abs() < 1e-12);
    assert!((mask.y_min - 1.0 / 3.0).abs() < 1e-12);
    assert!((mask.y_max - 2.0 / 3.0).abs() < 1e-12);
}

#[test]
fn grid_cells_tile_the_unit_square() {
    let k = 4;
    let mut covered = 0.0;
    for row in 0..k {
        for col in 0..k {
            let mask = RegionMask::grid_cell(row, col, k);
            covered += (mask.x_max - mask.x_min) * (mask.y_max - mask.y_min);
        }
    }
    assert!((covered - 1.0).abs() < 1e-9);
}

#[test]
fn evidence_map_derives_dimensions_from_rows() {
    let map = EvidenceMap::from_rows(vec![vec![0.0, 1.0, 0.5], vec![0.2, 0.3, 0.4]]);
    assert_eq!(map.width, 3);
    assert_eq!(map.height, 2);
}
