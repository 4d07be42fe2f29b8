//! Counterfactual probe types: region masks, per-probe deltas, and the
//! aggregated probe surface.

use serde::{Deserialize, Serialize};

use crate::overlay::OverlayRegion;

/// A rectangle in normalized image coordinates, applied by filling with the
/// fixed neutral value.
///
/// `region_id` follows `grid_r{row}_c{col}_k{k}` for grid masks and
/// `evidence_r{idx}` for overlay-derived masks. Overlay-derived ids index
/// sorted order within one bundle only; consumers joining regions across
/// sweeps must join by geometry, not by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMask {
    pub region_id: String,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl RegionMask {
    /// The mask for cell `(row, col)` of a `k×k` grid.
    pub fn grid_cell(row: usize, col: usize, k: usize) -> Self {
        let k_f = k as f64;
        Self {
            region_id: format!("grid_r{row}_c{col}_k{k}"),
            x_min: col as f64 / k_f,
            y_min: row as f64 / k_f,
            x_max: (col + 1) as f64 / k_f,
            y_max: (row + 1) as f64 / k_f,
        }
    }

    /// The mask covering an extracted overlay region's bounding box.
    ///
    /// Carries the region's `evidence_r{idx}` id, so downstream probe
    /// results join directly against the overlay bundle they came from.
    pub fn from_overlay_region(region: &OverlayRegion) -> Self {
        Self {
            region_id: region.region_id.clone(),
            x_min: region.x_min,
            y_min: region.y_min,
            x_max: region.x_max,
            y_max: region.y_max,
        }
    }
}

/// One probe coordinate: which region was masked, observed at which
/// perturbation point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterfactualProbe {
    pub region_id: String,
    pub axis: String,
    pub value: String,
}

/// Baseline and masked scores for one probe, with their signed deltas
/// (masked − baseline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub region_id: String,
    pub axis: String,
    pub value: String,
    pub baseline_esi: f64,
    pub masked_esi: f64,
    pub delta_esi: f64,
    pub baseline_drift: f64,
    pub masked_drift: f64,
    pub delta_drift: f64,
}

/// The counterfactual artifact: results sorted by `(region_id, axis,
/// value)` plus mean/max absolute-delta aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSurface {
    pub grid_k: u64,
    pub results: Vec<ProbeResult>,
    pub mean_abs_delta_esi: f64,
    pub max_abs_delta_esi: f64,
    pub mean_abs_delta_drift: f64,
    pub max_abs_delta_drift: f64,
}
