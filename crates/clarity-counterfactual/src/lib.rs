//! # clarity-counterfactual
//!
//! **Tier 2 (Probe Engine)**
//!
//! Answers "which part of the image did the answer depend on?" by masking
//! one grid region at a time, re-running the sweep on the masked baseline,
//! and measuring how ESI and drift move against the unmasked metrics.
//!
//! ## What belongs here
//! * Grid region enumeration and masked re-sweeps
//! * Per-probe delta computation and aggregation
//!
//! ## What does NOT belong here
//! * Mask pixel arithmetic (clarity-image)
//! * Metric definitions (clarity-metrics)

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use clarity_canon::stats::{max_abs, mean_abs};
use clarity_canon::{SerializationError, quantize};
use clarity_image::PerturbationError;
use clarity_metrics::{MetricComputationError, MetricsEngine};
use clarity_sweep::{SweepError, SweepOrchestrator};
use clarity_types::probe::{ProbeResult, ProbeSurface, RegionMask};
use clarity_types::surface::MetricsResult;
use clarity_types::SweepSpec;

/// Artifact path of the probe surface, relative to the sweep root.
pub const PROBE_SURFACE_FILE: &str = "counterfactual/probe_surface.json";

/// Directory the per-region re-sweeps land in, relative to the sweep root.
pub const PROBE_RUNS_DIR: &str = "counterfactual/regions";

/// Failures of counterfactual probing.
#[derive(Debug, Error)]
pub enum CounterfactualComputationError {
    #[error("grid size {k} is invalid: {reason}")]
    InvalidGrid { k: usize, reason: &'static str },

    #[error("probe mask set is empty")]
    EmptyMaskSet,

    #[error("region id {region_id} appears more than once in the mask set")]
    DuplicateRegion { region_id: String },

    #[error("baseline image rejected: {source}")]
    BaselineImage {
        #[source]
        source: PerturbationError,
    },

    #[error("masking failed for region {region_id}: {source}")]
    Mask {
        region_id: String,
        #[source]
        source: PerturbationError,
    },

    #[error("re-sweep failed for region {region_id}: {source}")]
    Resweep {
        region_id: String,
        #[source]
        source: SweepError,
    },

    #[error("metric recomputation failed for region {region_id}: {source}")]
    Remetric {
        region_id: String,
        #[source]
        source: MetricComputationError,
    },

    #[error("metrics are missing a score for axis {axis}, value {value}")]
    ScoreMissing { axis: String, value: String },

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// The probe engine. Stateless; composes the orchestrator and metrics
/// engine it is handed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterfactualEngine;

/// Largest accepted grid side; `k×k` sweeps grow quadratically.
pub const MAX_GRID_K: usize = 8;

impl CounterfactualEngine {
    pub fn new() -> Self {
        Self
    }

    /// Probe every cell of the `k×k` grid.
    ///
    /// `baseline_metrics` are the metrics of the unmasked sweep; each
    /// region's re-sweep runs into `scratch_dir/<region_id>/` with the
    /// masked image substituted for the baseline. Results are sorted by
    /// `(region_id, axis, value)`.
    #[allow(clippy::too_many_arguments)]
    pub fn probe(
        &self,
        baseline_image: &[u8],
        spec: &SweepSpec,
        grid_k: usize,
        orchestrator: &SweepOrchestrator<'_>,
        metrics_engine: &MetricsEngine,
        baseline_metrics: &MetricsResult,
        scratch_dir: &Path,
    ) -> Result<ProbeSurface, CounterfactualComputationError> {
        if grid_k == 0 {
            return Err(CounterfactualComputationError::InvalidGrid {
                k: grid_k,
                reason: "grid must have at least one cell",
            });
        }
        if grid_k > MAX_GRID_K {
            return Err(CounterfactualComputationError::InvalidGrid {
                k: grid_k,
                reason: "grid side exceeds the supported maximum",
            });
        }
        let mut masks = Vec::with_capacity(grid_k * grid_k);
        for row in 0..grid_k {
            for col in 0..grid_k {
                masks.push(RegionMask::grid_cell(row, col, grid_k));
            }
        }
        self.probe_masks(
            baseline_image,
            spec,
            grid_k as u64,
            &masks,
            orchestrator,
            metrics_engine,
            baseline_metrics,
            scratch_dir,
        )
    }

    /// Probe an explicit mask set: overlay-derived `evidence_r{idx}`
    /// regions, or any caller-chosen rectangles.
    ///
    /// `grid_k` is recorded on the surface verbatim; mask-driven probes
    /// pass `0` to mark a non-grid set. Region ids must be unique because
    /// they double as re-sweep directory names.
    #[allow(clippy::too_many_arguments)]
    pub fn probe_masks(
        &self,
        baseline_image: &[u8],
        spec: &SweepSpec,
        grid_k: u64,
        masks: &[RegionMask],
        orchestrator: &SweepOrchestrator<'_>,
        metrics_engine: &MetricsEngine,
        baseline_metrics: &MetricsResult,
        scratch_dir: &Path,
    ) -> Result<ProbeSurface, CounterfactualComputationError> {
        if masks.is_empty() {
            return Err(CounterfactualComputationError::EmptyMaskSet);
        }
        let mut seen_ids = std::collections::BTreeSet::new();
        for mask in masks {
            if !seen_ids.insert(mask.region_id.as_str()) {
                return Err(CounterfactualComputationError::DuplicateRegion {
                    region_id: mask.region_id.clone(),
                });
            }
        }
        // Fail before any re-sweep if the baseline is unusable.
        clarity_image::Raster::decode(baseline_image)
            .map_err(|source| CounterfactualComputationError::BaselineImage { source })?;

        let baseline_esi = score_table(baseline_metrics, Table::Esi);
        let baseline_drift = score_table(baseline_metrics, Table::Drift);

        info!(regions = masks.len(), "counterfactual probe started");
        let mut results = Vec::new();
        for mask in masks {
            let region_id = mask.region_id.clone();
            debug!(%region_id, "probing region");

            let masked = clarity_image::mask_png(baseline_image, mask).map_err(|source| {
                CounterfactualComputationError::Mask {
                    region_id: region_id.clone(),
                    source,
                }
            })?;

            let masked_spec = SweepSpec {
                run_id: format!("{}-{region_id}", spec.run_id),
                image_bytes: masked,
                ..spec.clone()
            };
            let region_dir = scratch_dir.join(&region_id);
            orchestrator
                .run(&masked_spec, &region_dir)
                .map_err(|source| CounterfactualComputationError::Resweep {
                    region_id: region_id.clone(),
                    source,
                })?;
            let masked_metrics =
                metrics_engine
                    .compute(&region_dir)
                    .map_err(|source| CounterfactualComputationError::Remetric {
                        region_id: region_id.clone(),
                        source,
                    })?;

            let masked_esi = score_table(&masked_metrics, Table::Esi);
            let masked_drift = score_table(&masked_metrics, Table::Drift);
            for ((axis, value), baseline_score) in &baseline_esi {
                let masked_score = lookup(&masked_esi, axis, value)?;
                let baseline_drift_score = lookup(&baseline_drift, axis, value)?;
                let masked_drift_score = lookup(&masked_drift, axis, value)?;
                results.push(ProbeResult {
                    region_id: region_id.clone(),
                    axis: axis.clone(),
                    value: value.clone(),
                    baseline_esi: *baseline_score,
                    masked_esi: masked_score,
                    delta_esi: quantize(masked_score - baseline_score)?,
                    baseline_drift: baseline_drift_score,
                    masked_drift: masked_drift_score,
                    delta_drift: quantize(masked_drift_score - baseline_drift_score)?,
                });
            }
        }

        results.sort_by(|a, b| {
            (&a.region_id, &a.axis, &a.value).cmp(&(&b.region_id, &b.axis, &b.value))
        });

        let delta_esi: Vec<f64> = results.iter().map(|r| r.delta_esi).collect();
        let delta_drift: Vec<f64> = results.iter().map(|r| r.delta_drift).collect();
        let surface = ProbeSurface {
            grid_k,
            results,
            mean_abs_delta_esi: quantize(mean_abs(&delta_esi))?,
            max_abs_delta_esi: quantize(max_abs(&delta_esi))?,
            mean_abs_delta_drift: quantize(mean_abs(&delta_drift))?,
            max_abs_delta_drift: quantize(max_abs(&delta_drift))?,
        };
        info!(
            probes = surface.results.len(),
            max_abs_delta_esi = surface.max_abs_delta_esi,
            "counterfactual probe complete"
        );
        Ok(surface)
    }
}

enum Table {
    Esi,
    Drift,
}

fn score_table(metrics: &MetricsResult, table: Table) -> BTreeMap<(String, String), f64> {
    let mut out = BTreeMap::new();
    match table {
        Table::Esi => {
            for metric in &metrics.esi {
                for (value, score) in &metric.value_scores {
                    out.insert((metric.axis.clone(), value.clone()), *score);
                }
            }
        }
        Table::Drift => {
            for metric in &metrics.drift {
                for (value, score) in &metric.value_scores {
                    out.insert((metric.axis.clone(), value.clone()), *score);
                }
            }
        }
    }
    out
}

fn lookup(
    table: &BTreeMap<(String, String), f64>,
    axis: &str,
    value: &str,
) -> Result<f64, CounterfactualComputationError> {
    table
        .get(&(axis.to_string(), value.to_string()))
        .copied()
        .ok_or_else(|| CounterfactualComputationError::ScoreMissing {
            axis: axis.to_string(),
            value: value.to_string(),
        })
}
