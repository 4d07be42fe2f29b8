//! Unit tests for the surface join, scalar surfaces, and gradients.

use std::collections::BTreeMap;

use clarity_surface::{GradientEngine, SurfaceComputationError, SurfaceEngine};
use clarity_types::surface::{DriftMetric, EsiMetric, MetricsResult};

fn metric(axis: &str, scores: &[(&str, f64)]) -> (EsiMetric, DriftMetric) {
    let value_scores: BTreeMap<String, f64> = scores
        .iter()
        .map(|(value, score)| (value.to_string(), *score))
        .collect();
    let overall: f64 =
        value_scores.values().sum::<f64>() / value_scores.len() as f64;
    (
        EsiMetric {
            axis: axis.to_string(),
            value_scores: value_scores.clone(),
            overall_score: overall,
        },
        DriftMetric {
            axis: axis.to_string(),
            value_scores: value_scores.iter().map(|(k, v)| (k.clone(), v * 0.5)).collect(),
            overall_score: overall * 0.5,
        },
    )
}

fn metrics(axes: &[(&str, &[(&str, f64)])]) -> MetricsResult {
    let mut esi = Vec::new();
    let mut drift = Vec::new();
    for (axis, scores) in axes {
        let (e, d) = metric(axis, scores);
        esi.push(e);
        drift.push(d);
    }
    MetricsResult { esi, drift }
}

// ── Robustness surface ──────────────────────────────────────────────────────

#[test]
fn points_are_ordered_lexicographically_by_encoded_value() {
    let input = metrics(&[(
        "brightness",
        &[("1p2", 0.0), ("0p8", 1.0), ("1p0", 1.0)],
    )]);
    let surface = SurfaceEngine::new().compute(&input).unwrap();
    let values: Vec<&str> = surface.axes[0]
        .points
        .iter()
        .map(|p| p.value.as_str())
        .collect();
    assert_eq!(values, vec!["0p8", "1p0", "1p2"]);
}

#[test]
fn population_variance_divides_by_n() {
    let input = metrics(&[("blur", &[("0p0", 1.0), ("1p0", 0.0)])]);
    let surface = SurfaceEngine::new().compute(&input).unwrap();
    let axis = &surface.axes[0];
    assert_eq!(axis.mean_esi, 0.5);
    // Population variance of {0, 1} is 0.25, not the sample variance 0.5.
    assert_eq!(axis.variance_esi, 0.25);
}

#[test]
fn global_statistics_run_across_all_axes() {
    let input = metrics(&[
        ("blur", &[("0p0", 1.0), ("1p0", 1.0)]),
        ("contrast", &[("1p0", 0.0), ("2p0", 0.0)]),
    ]);
    let surface = SurfaceEngine::new().compute(&input).unwrap();
    assert_eq!(surface.global_mean_esi, 0.5);
    assert_eq!(surface.global_variance_esi, 0.25);
    assert_eq!(surface.axes.len(), 2);
}

#[test]
fn axis_mismatch_is_rejected() {
    let mut input = metrics(&[("blur", &[("0p0", 1.0)])]);
    input.drift[0].axis = "contrast".to_string();
    assert!(matches!(
        SurfaceEngine::new().compute(&input),
        Err(SurfaceComputationError::AxisMismatch { .. })
    ));
}

#[test]
fn value_mismatch_is_rejected() {
    let mut input = metrics(&[("blur", &[("0p0", 1.0), ("1p0", 1.0)])]);
    input.drift[0].value_scores.remove("1p0");
    assert!(matches!(
        SurfaceEngine::new().compute(&input),
        Err(SurfaceComputationError::ValueMismatch { .. })
    ));
}

#[test]
fn non_finite_input_is_rejected() {
    let mut input = metrics(&[("blur", &[("0p0", 1.0)])]);
    input
        .esi[0]
        .value_scores
        .insert("0p0".to_string(), f64::INFINITY);
    assert!(matches!(
        SurfaceEngine::new().compute(&input),
        Err(SurfaceComputationError::NonFinite { .. })
    ));
}

#[test]
fn computation_is_idempotent_including_order() {
    let input = metrics(&[
        ("brightness", &[("0p8", 1.0), ("1p0", 1.0), ("1p2", 0.0)]),
        ("occlusion", &[("0p1", 0.5), ("0p3", 0.25)]),
    ]);
    let engine = SurfaceEngine::new();
    let first = engine.compute(&input).unwrap();
    let second = engine.compute(&input).unwrap();
    assert_eq!(first, second);
}

// ── Scalar surfaces ─────────────────────────────────────────────────────────

#[test]
fn scalar_surface_mirrors_the_construction() {
    let scores = BTreeMap::from([(
        "brightness".to_string(),
        BTreeMap::from([
            ("0p8".to_string(), 0.9),
            ("1p0".to_string(), 0.95),
            ("1p2".to_string(), 0.7),
        ]),
    )]);
    let surface = SurfaceEngine::new()
        .compute_scalar("confidence", &scores)
        .unwrap();
    assert_eq!(surface.metric, "confidence");
    assert_eq!(surface.axes[0].points.len(), 3);
    assert_eq!(surface.global_mean, 0.85);
}

#[test]
fn empty_scalar_surface_has_zero_globals() {
    let surface = SurfaceEngine::new()
        .compute_scalar("entropy", &BTreeMap::new())
        .unwrap();
    assert!(surface.axes.is_empty());
    assert_eq!(surface.global_mean, 0.0);
    assert_eq!(surface.global_variance, 0.0);
}

// ── Gradients ───────────────────────────────────────────────────────────────

#[test]
fn cliff_gradients_reflect_the_failing_endpoint() {
    let input = metrics(&[(
        "brightness",
        &[("0p8", 1.0), ("1p0", 1.0), ("1p2", 0.0)],
    )]);
    let surface = SurfaceEngine::new().compute(&input).unwrap();
    let gradient = GradientEngine::new().compute(&surface).unwrap();

    let axis = &gradient.axes[0];
    let d_esi: Vec<f64> = axis.points.iter().map(|p| p.d_esi).collect();
    assert_eq!(d_esi, vec![0.0, -0.5, -1.0]);
    assert_eq!(axis.max_abs_d_esi, 1.0);
    assert_eq!(axis.mean_abs_d_esi, 0.5);
    assert_eq!(gradient.global_max_abs_d_esi, 1.0);
}

#[test]
fn flat_surface_has_zero_gradients() {
    let input = metrics(&[("blur", &[("0p0", 1.0), ("1p0", 1.0), ("2p0", 1.0)])]);
    let surface = SurfaceEngine::new().compute(&input).unwrap();
    let gradient = GradientEngine::new().compute(&surface).unwrap();
    for point in &gradient.axes[0].points {
        assert_eq!(point.d_esi, 0.0);
        assert_eq!(point.d_drift, 0.0);
    }
    assert_eq!(gradient.global_mean_abs_d_esi, 0.0);
}

#[test]
fn single_value_axis_emits_one_zero_gradient_point() {
    let input = metrics(&[("occlusion", &[("0p5", 0.75)])]);
    let surface = SurfaceEngine::new().compute(&input).unwrap();
    assert_eq!(surface.axes[0].variance_esi, 0.0);

    let gradient = GradientEngine::new().compute(&surface).unwrap();
    let points = &gradient.axes[0].points;
    assert_eq!(points.len(), 1);
    assert_eq!((points[0].d_esi, points[0].d_drift), (0.0, 0.0));
}
