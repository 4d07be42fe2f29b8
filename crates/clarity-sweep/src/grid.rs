//! Canonical enumeration of the perturbation grid.
//!
//! Canonical order is fixed: axes alphabetical on their lowercase name,
//! values in declared order, seeds in declared order. Everything downstream
//! (manifest layout, baseline selection, metric iteration) leans on this
//! order, so it lives in one place.

use clarity_types::{PerturbationKind, SweepSpec, encode_axis_value};

use crate::SweepError;

/// One `(axis, value, seed)` cell of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    pub kind: PerturbationKind,
    pub axis: String,
    pub value: f64,
    pub value_encoded: String,
    pub seed: u64,
}

impl GridPoint {
    /// The run key and sweep-root-relative directory of this cell.
    pub fn run_key(&self) -> String {
        format!("{}/{}/{}", self.axis, self.value_encoded, self.seed)
    }
}

/// Enumerate the grid in canonical order.
///
/// The baseline run is not part of the grid; the orchestrator prepends it.
pub fn enumerate(spec: &SweepSpec) -> Result<Vec<GridPoint>, SweepError> {
    let mut axes: Vec<_> = spec.axes.iter().collect();
    axes.sort_by_key(|axis| axis.kind.as_str());

    let mut points = Vec::new();
    for axis in axes {
        for value in &axis.values {
            let value_encoded =
                encode_axis_value(*value).map_err(|err| SweepError::InvalidSpec {
                    reason: err.to_string(),
                })?;
            for seed in &spec.seeds {
                points.push(GridPoint {
                    kind: axis.kind,
                    axis: axis.kind.as_str().to_string(),
                    value: *value,
                    value_encoded: value_encoded.clone(),
                    seed: *seed,
                });
            }
        }
    }
    Ok(points)
}
