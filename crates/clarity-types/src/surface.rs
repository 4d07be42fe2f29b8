//! Metric and surface artifact types.
//!
//! Every list here has a stated total order: metric vectors are alphabetical
//! on axis name, point lists are lexicographic on the encoded value string.
//! The engines enforce those orders at construction; the types just record
//! them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Evidence Stability Index for one axis: per-value proportion of seeds
/// whose answer matched the baseline answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsiMetric {
    pub axis: String,
    pub value_scores: BTreeMap<String, f64>,
    /// Arithmetic mean over the axis's values.
    pub overall_score: f64,
}

/// Justification drift for one axis: per-value mean normalized Levenshtein
/// distance between run and baseline justifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftMetric {
    pub axis: String,
    pub value_scores: BTreeMap<String, f64>,
    pub overall_score: f64,
}

/// The metrics artifact: ESI and Drift per axis, axes alphabetical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub esi: Vec<EsiMetric>,
    pub drift: Vec<DriftMetric>,
}

/// One joined point of the robustness surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfacePoint {
    pub axis: String,
    pub value: String,
    pub esi: f64,
    pub drift: f64,
}

/// Per-axis slice of the robustness surface with population statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSurface {
    pub axis: String,
    /// Points ordered lexicographically on the encoded value string.
    pub points: Vec<SurfacePoint>,
    pub mean_esi: f64,
    pub mean_drift: f64,
    pub variance_esi: f64,
    pub variance_drift: f64,
}

/// The robustness surface artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessSurface {
    pub axes: Vec<AxisSurface>,
    pub global_mean_esi: f64,
    pub global_mean_drift: f64,
    pub global_variance_esi: f64,
    pub global_variance_drift: f64,
}

/// One point of a single-score surface (confidence or entropy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarPoint {
    pub value: String,
    pub score: f64,
}

/// Per-axis slice of a scalar surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarAxisSurface {
    pub axis: String,
    pub points: Vec<ScalarPoint>,
    pub mean: f64,
    pub variance: f64,
}

/// A scalar analogue of the robustness surface, built by the same
/// construction: CSI from per-run confidence, EDM from per-run entropy.
///
/// When the sweep ran without rich signals the surface is emitted with no
/// axes and zero global statistics, so the canonical bundle list keeps its
/// shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarSurface {
    /// `confidence` or `entropy`.
    pub metric: String,
    pub axes: Vec<ScalarAxisSurface>,
    pub global_mean: f64,
    pub global_variance: f64,
}

/// Finite-difference gradient at one surface point, unit spacing assumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientPoint {
    pub value: String,
    pub d_esi: f64,
    pub d_drift: f64,
}

/// Per-axis gradient list with absolute-slope statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisGradient {
    pub axis: String,
    pub points: Vec<GradientPoint>,
    pub mean_abs_d_esi: f64,
    pub max_abs_d_esi: f64,
    pub mean_abs_d_drift: f64,
    pub max_abs_d_drift: f64,
}

/// The gradient surface artifact.
///
/// Interpretation (cliff detection, flagging) is a consumer concern; the
/// engine only reports the numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientSurface {
    pub axes: Vec<AxisGradient>,
    pub global_mean_abs_d_esi: f64,
    pub global_max_abs_d_esi: f64,
    pub global_mean_abs_d_drift: f64,
    pub global_max_abs_d_drift: f64,
}
