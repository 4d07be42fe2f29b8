//! Evidence overlay types: raw evidence maps, normalized heatmaps, and
//! extracted regions.

use serde::{Deserialize, Serialize};

/// A raw 2-D evidence matrix from the adapter's spatial attention proxy.
///
/// `values` is row-major: `values.len() == height`, every row has length
/// `width`. Validation (rectangularity, finiteness) happens in the overlay
/// engine, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMap {
    pub width: u64,
    pub height: u64,
    pub values: Vec<Vec<f64>>,
}

impl EvidenceMap {
    /// Build a map from row-major rows, deriving the dimensions.
    ///
    /// An empty or ragged `rows` produces dimensions the overlay engine
    /// will reject; this constructor does not validate.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let height = rows.len() as u64;
        let width = rows.first().map_or(0, Vec::len) as u64;
        Self {
            width,
            height,
            values: rows,
        }
    }
}

/// A min-max normalized, clipped, 8-decimal quantized evidence map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub width: u64,
    pub height: u64,
    pub values: Vec<Vec<f64>>,
}

/// One connected high-evidence region, bounding box in normalized
/// coordinates, area as the fraction of total cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayRegion {
    /// `evidence_r{i}` in `(area desc, x_min asc, y_min asc)` order.
    pub region_id: String,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub area: f64,
}

/// The overlay artifact: the raw map, its heatmap, and extracted regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayBundle {
    pub evidence_map: EvidenceMap,
    pub heatmap: Heatmap,
    pub regions: Vec<OverlayRegion>,
}
