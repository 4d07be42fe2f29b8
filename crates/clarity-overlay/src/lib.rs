//! # clarity-overlay
//!
//! **Tier 2 (Overlay Engine)**
//!
//! Evidence-map post-processing: validation, min-max heatmap
//! normalization, and fixed-threshold region extraction.
//!
//! The extraction order is load-bearing: components are discovered by BFS
//! with a FIFO frontier seeded in row-major scan order. A stack-based DFS
//! would visit cells in a different order and shift `region_id`
//! assignment, which is part of the artifact contract.
//!
//! ## What belongs here
//! * Evidence-map validation and normalization
//! * Connected-component region extraction
//!
//! ## What does NOT belong here
//! * Producing evidence maps (the adapter does)
//! * Rendering (report collaborators consume the bundle)

use std::collections::VecDeque;

use thiserror::Error;

use clarity_canon::{SerializationError, quantize};
use clarity_types::overlay::{EvidenceMap, Heatmap, OverlayBundle, OverlayRegion};

/// Artifact path of the overlay bundle, relative to the sweep root.
pub const OVERLAY_BUNDLE_FILE: &str = "overlay/overlay_bundle.json";

/// Fixed extraction threshold; cells with normalized value strictly above
/// it belong to a region.
pub const REGION_THRESHOLD: f64 = 0.7;

/// Failures of overlay computation.
#[derive(Debug, Error)]
pub enum OverlayComputationError {
    #[error("evidence map is empty")]
    EmptyMap,

    #[error("evidence map is ragged: row {row} has {actual} cells, expected {expected}")]
    RaggedMap {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("evidence map has a non-finite value at row {row}, column {col}")]
    NonFinite { row: usize, col: usize },

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// The overlay engine. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayEngine;

impl OverlayEngine {
    pub fn new() -> Self {
        Self
    }

    /// Validate a raw evidence map: non-empty, rectangular, finite.
    pub fn validate(&self, map: &EvidenceMap) -> Result<(), OverlayComputationError> {
        if map.values.is_empty() || map.values[0].is_empty() {
            return Err(OverlayComputationError::EmptyMap);
        }
        let expected = map.values[0].len();
        for (row, cells) in map.values.iter().enumerate() {
            if cells.len() != expected {
                return Err(OverlayComputationError::RaggedMap {
                    row,
                    expected,
                    actual: cells.len(),
                });
            }
            for (col, value) in cells.iter().enumerate() {
                if !value.is_finite() {
                    return Err(OverlayComputationError::NonFinite { row, col });
                }
            }
        }
        Ok(())
    }

    /// Min-max normalize to `[0, 1]`, clip, quantize.
    ///
    /// A flat map has no dynamic range to normalize; it maps to all zeros
    /// (and therefore extracts no regions).
    pub fn normalize(&self, map: &EvidenceMap) -> Result<Heatmap, OverlayComputationError> {
        self.validate(map)?;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for row in &map.values {
            for value in row {
                min = min.min(*value);
                max = max.max(*value);
            }
        }
        let range = max - min;

        let mut rows = Vec::with_capacity(map.values.len());
        for row in &map.values {
            let mut out = Vec::with_capacity(row.len());
            for value in row {
                let normalized = if range == 0.0 {
                    0.0
                } else {
                    ((value - min) / range).clamp(0.0, 1.0)
                };
                out.push(quantize(normalized)?);
            }
            rows.push(out);
        }
        Ok(Heatmap {
            width: map.width,
            height: map.height,
            values: rows,
        })
    }

    /// Extract connected high-evidence regions from a normalized heatmap.
    ///
    /// Threshold is strict (`v > τ`); components use 4-connectivity;
    /// bounding boxes are normalized with cell-exclusive upper edges; area
    /// is the component's cell count over the total cell count. Regions
    /// come back sorted `(area desc, x_min asc, y_min asc)` with ids
    /// `evidence_r{i}` assigned in that order.
    pub fn extract_regions(
        &self,
        heatmap: &Heatmap,
    ) -> Result<Vec<OverlayRegion>, OverlayComputationError> {
        let height = heatmap.values.len();
        if height == 0 || heatmap.values[0].is_empty() {
            return Err(OverlayComputationError::EmptyMap);
        }
        let width = heatmap.values[0].len();
        let total_cells = (width * height) as f64;

        let mut visited = vec![vec![false; width]; height];
        let mut components: Vec<Component> = Vec::new();

        for start_row in 0..height {
            for start_col in 0..width {
                if visited[start_row][start_col]
                    || heatmap.values[start_row][start_col] <= REGION_THRESHOLD
                {
                    continue;
                }

                let mut component = Component::seed(start_row, start_col);
                visited[start_row][start_col] = true;
                let mut frontier = VecDeque::new();
                frontier.push_back((start_row, start_col));
                while let Some((row, col)) = frontier.pop_front() {
                    component.absorb(row, col);
                    for (next_row, next_col) in neighbors(row, col, width, height) {
                        if !visited[next_row][next_col]
                            && heatmap.values[next_row][next_col] > REGION_THRESHOLD
                        {
                            visited[next_row][next_col] = true;
                            frontier.push_back((next_row, next_col));
                        }
                    }
                }
                components.push(component);
            }
        }

        let mut regions = Vec::with_capacity(components.len());
        for component in &components {
            regions.push(component.to_region(width, height, total_cells)?);
        }
        regions.sort_by(|a, b| {
            b.area
                .partial_cmp(&a.area)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a.x_min
                        .partial_cmp(&b.x_min)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| {
                    a.y_min
                        .partial_cmp(&b.y_min)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        for (index, region) in regions.iter_mut().enumerate() {
            region.region_id = format!("evidence_r{index}");
        }
        Ok(regions)
    }

    /// Normalize, extract, and bundle in one pass.
    pub fn build_bundle(&self, map: &EvidenceMap) -> Result<OverlayBundle, OverlayComputationError> {
        let heatmap = self.normalize(map)?;
        let regions = self.extract_regions(&heatmap)?;
        Ok(OverlayBundle {
            evidence_map: map.clone(),
            heatmap,
            regions,
        })
    }
}

/// Accumulated bounding box of one connected component, in cell indices.
struct Component {
    min_row: usize,
    max_row: usize,
    min_col: usize,
    max_col: usize,
    cells: usize,
}

impl Component {
    fn seed(row: usize, col: usize) -> Self {
        Self {
            min_row: row,
            max_row: row,
            min_col: col,
            max_col: col,
            cells: 0,
        }
    }

    fn absorb(&mut self, row: usize, col: usize) {
        self.min_row = self.min_row.min(row);
        self.max_row = self.max_row.max(row);
        self.min_col = self.min_col.min(col);
        self.max_col = self.max_col.max(col);
        self.cells += 1;
    }

    fn to_region(
        &self,
        width: usize,
        height: usize,
        total_cells: f64,
    ) -> Result<OverlayRegion, OverlayComputationError> {
        Ok(OverlayRegion {
            region_id: String::new(),
            x_min: quantize(self.min_col as f64 / width as f64)?,
            y_min: quantize(self.min_row as f64 / height as f64)?,
            x_max: quantize((self.max_col + 1) as f64 / width as f64)?,
            y_max: quantize((self.max_row + 1) as f64 / height as f64)?,
            area: quantize(self.cells as f64 / total_cells)?,
        })
    }
}

fn neighbors(
    row: usize,
    col: usize,
    width: usize,
    height: usize,
) -> impl Iterator<Item = (usize, usize)> {
    let mut out = Vec::with_capacity(4);
    if row > 0 {
        out.push((row - 1, col));
    }
    if col > 0 {
        out.push((row, col - 1));
    }
    if col + 1 < width {
        out.push((row, col + 1));
    }
    if row + 1 < height {
        out.push((row + 1, col));
    }
    out.into_iter()
}
