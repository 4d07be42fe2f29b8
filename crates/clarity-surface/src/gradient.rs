//! Finite-difference gradient estimation over the robustness surface.
//!
//! Unit spacing is assumed between consecutive points of an axis in their
//! stored (lexicographic) order: interior gradient at `i` is
//! `(f[i+1] - f[i-1]) / 2`, endpoints use the one-sided first difference,
//! and a single-value axis has gradient zero.

use thiserror::Error;

use clarity_canon::stats::{max_abs, mean_abs};
use clarity_canon::{SerializationError, quantize};
use clarity_types::surface::{AxisGradient, GradientPoint, GradientSurface, RobustnessSurface};

/// Artifact path of the gradient surface, relative to the sweep root.
pub const GRADIENT_SURFACE_FILE: &str = "gradient/gradient_surface.json";

/// Failures of gradient estimation.
#[derive(Debug, Error)]
pub enum GradientComputationError {
    #[error("non-finite surface input at axis {axis}, value {value}")]
    NonFinite { axis: String, value: String },

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// The gradient engine. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradientEngine;

impl GradientEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn compute(
        &self,
        surface: &RobustnessSurface,
    ) -> Result<GradientSurface, GradientComputationError> {
        let mut axes = Vec::with_capacity(surface.axes.len());
        let mut all_d_esi = Vec::new();
        let mut all_d_drift = Vec::new();

        for axis_surface in &surface.axes {
            let esi: Vec<f64> = axis_surface.points.iter().map(|p| p.esi).collect();
            let drift: Vec<f64> = axis_surface.points.iter().map(|p| p.drift).collect();
            for point in &axis_surface.points {
                if !point.esi.is_finite() || !point.drift.is_finite() {
                    return Err(GradientComputationError::NonFinite {
                        axis: axis_surface.axis.clone(),
                        value: point.value.clone(),
                    });
                }
            }

            let d_esi = slopes(&esi);
            let d_drift = slopes(&drift);
            let mut points = Vec::with_capacity(axis_surface.points.len());
            for (index, point) in axis_surface.points.iter().enumerate() {
                points.push(GradientPoint {
                    value: point.value.clone(),
                    d_esi: quantize(d_esi[index])?,
                    d_drift: quantize(d_drift[index])?,
                });
            }

            let axis_d_esi: Vec<f64> = points.iter().map(|p| p.d_esi).collect();
            let axis_d_drift: Vec<f64> = points.iter().map(|p| p.d_drift).collect();
            all_d_esi.extend_from_slice(&axis_d_esi);
            all_d_drift.extend_from_slice(&axis_d_drift);
            axes.push(AxisGradient {
                axis: axis_surface.axis.clone(),
                points,
                mean_abs_d_esi: quantize(mean_abs(&axis_d_esi))?,
                max_abs_d_esi: quantize(max_abs(&axis_d_esi))?,
                mean_abs_d_drift: quantize(mean_abs(&axis_d_drift))?,
                max_abs_d_drift: quantize(max_abs(&axis_d_drift))?,
            });
        }

        Ok(GradientSurface {
            axes,
            global_mean_abs_d_esi: quantize(mean_abs(&all_d_esi))?,
            global_max_abs_d_esi: quantize(max_abs(&all_d_esi))?,
            global_mean_abs_d_drift: quantize(mean_abs(&all_d_drift))?,
            global_max_abs_d_drift: quantize(max_abs(&all_d_drift))?,
        })
    }
}

/// Central differences inside, one-sided first differences at the ends,
/// zero for a single sample.
fn slopes(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n <= 1 {
        return vec![0.0; n];
    }
    let mut out = Vec::with_capacity(n);
    out.push(values[1] - values[0]);
    for i in 1..n - 1 {
        out.push((values[i + 1] - values[i - 1]) / 2.0);
    }
    out.push(values[n - 1] - values[n - 2]);
    out
}
