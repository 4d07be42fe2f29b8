//! # clarity-surface
//!
//! **Tier 2 (Surface Engines)**
//!
//! Joins the metric artifacts into surfaces and estimates their gradients.
//! Pure functions of their inputs: no file I/O, no environment, no clock.
//!
//! ## What belongs here
//! * The ESI/drift join into `RobustnessSurface`
//! * The scalar (confidence/entropy) surface construction
//! * Finite-difference gradient estimation
//!
//! ## What does NOT belong here
//! * Reading sweep directories (clarity-metrics)
//! * Writing artifacts (the facade drives emission)

pub mod gradient;

use std::collections::BTreeMap;

use thiserror::Error;

use clarity_canon::stats::{mean, population_variance};
use clarity_canon::{SerializationError, quantize};
use clarity_types::surface::{
    AxisSurface, MetricsResult, RobustnessSurface, ScalarAxisSurface, ScalarPoint, ScalarSurface,
    SurfacePoint,
};

pub use gradient::{GradientComputationError, GradientEngine};

/// Artifact path of the robustness surface, relative to the sweep root.
pub const ROBUSTNESS_SURFACE_FILE: &str = "surface/robustness_surface.json";

/// Artifact path of the confidence (CSI) surface.
pub const CONFIDENCE_SURFACE_FILE: &str = "surface/confidence_surface.json";

/// Artifact path of the entropy (EDM) surface.
pub const ENTROPY_SURFACE_FILE: &str = "surface/entropy_surface.json";

/// Failures of surface construction.
#[derive(Debug, Error)]
pub enum SurfaceComputationError {
    #[error("esi axes {esi:?} do not match drift axes {drift:?}")]
    AxisMismatch { esi: Vec<String>, drift: Vec<String> },

    #[error("axis {axis}: esi values {esi:?} do not match drift values {drift:?}")]
    ValueMismatch {
        axis: String,
        esi: Vec<String>,
        drift: Vec<String>,
    },

    #[error("non-finite score at axis {axis}, value {value}")]
    NonFinite { axis: String, value: String },

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// The surface engine. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurfaceEngine;

impl SurfaceEngine {
    pub fn new() -> Self {
        Self
    }

    /// Join ESI and drift into the robustness surface.
    ///
    /// Axis sets and per-axis value sets must match exactly; points are
    /// ordered lexicographically on the encoded value string; variances are
    /// population variances (divide by N); global statistics run across
    /// all points in all axes.
    pub fn compute(
        &self,
        metrics: &MetricsResult,
    ) -> Result<RobustnessSurface, SurfaceComputationError> {
        let esi_axes: Vec<String> = metrics.esi.iter().map(|m| m.axis.clone()).collect();
        let drift_axes: Vec<String> = metrics.drift.iter().map(|m| m.axis.clone()).collect();
        if esi_axes != drift_axes {
            return Err(SurfaceComputationError::AxisMismatch {
                esi: esi_axes,
                drift: drift_axes,
            });
        }

        let mut axes = Vec::with_capacity(metrics.esi.len());
        let mut all_esi = Vec::new();
        let mut all_drift = Vec::new();
        for (esi_metric, drift_metric) in metrics.esi.iter().zip(&metrics.drift) {
            let axis = &esi_metric.axis;
            let esi_values: Vec<String> = esi_metric.value_scores.keys().cloned().collect();
            let drift_values: Vec<String> = drift_metric.value_scores.keys().cloned().collect();
            if esi_values != drift_values {
                return Err(SurfaceComputationError::ValueMismatch {
                    axis: axis.clone(),
                    esi: esi_values,
                    drift: drift_values,
                });
            }

            let mut points = Vec::with_capacity(esi_values.len());
            for value in &esi_values {
                let esi = finite(axis, value, esi_metric.value_scores[value])?;
                let drift = finite(axis, value, drift_metric.value_scores[value])?;
                points.push(SurfacePoint {
                    axis: axis.clone(),
                    value: value.clone(),
                    esi,
                    drift,
                });
            }

            let esi_scores: Vec<f64> = points.iter().map(|p| p.esi).collect();
            let drift_scores: Vec<f64> = points.iter().map(|p| p.drift).collect();
            all_esi.extend_from_slice(&esi_scores);
            all_drift.extend_from_slice(&drift_scores);
            axes.push(AxisSurface {
                axis: axis.clone(),
                points,
                mean_esi: quantize(mean(&esi_scores))?,
                mean_drift: quantize(mean(&drift_scores))?,
                variance_esi: quantize(population_variance(&esi_scores))?,
                variance_drift: quantize(population_variance(&drift_scores))?,
            });
        }

        Ok(RobustnessSurface {
            axes,
            global_mean_esi: quantize(mean(&all_esi))?,
            global_mean_drift: quantize(mean(&all_drift))?,
            global_variance_esi: quantize(population_variance(&all_esi))?,
            global_variance_drift: quantize(population_variance(&all_drift))?,
        })
    }

    /// Build a scalar surface (CSI, EDM) by the same construction.
    ///
    /// `scores` maps axis → encoded value → score. An empty map produces
    /// the empty surface with zero global statistics, which is what a
    /// sweep without rich signals seals into the bundle.
    pub fn compute_scalar(
        &self,
        metric: &str,
        scores: &BTreeMap<String, BTreeMap<String, f64>>,
    ) -> Result<ScalarSurface, SurfaceComputationError> {
        let mut axes = Vec::with_capacity(scores.len());
        let mut all_scores = Vec::new();
        for (axis, value_scores) in scores {
            let mut points = Vec::with_capacity(value_scores.len());
            for (value, score) in value_scores {
                let score = finite(axis, value, *score)?;
                points.push(ScalarPoint {
                    value: value.clone(),
                    score,
                });
            }
            let axis_scores: Vec<f64> = points.iter().map(|p| p.score).collect();
            all_scores.extend_from_slice(&axis_scores);
            axes.push(ScalarAxisSurface {
                axis: axis.clone(),
                points,
                mean: quantize(mean(&axis_scores))?,
                variance: quantize(population_variance(&axis_scores))?,
            });
        }
        Ok(ScalarSurface {
            metric: metric.to_string(),
            axes,
            global_mean: quantize(mean(&all_scores))?,
            global_variance: quantize(population_variance(&all_scores))?,
        })
    }
}

fn finite(axis: &str, value: &str, score: f64) -> Result<f64, SurfaceComputationError> {
    if !score.is_finite() {
        return Err(SurfaceComputationError::NonFinite {
            axis: axis.to_string(),
            value: value.to_string(),
        });
    }
    Ok(score)
}
