//! # clarity-metrics
//!
//! **Tier 2 (Metric Engine)**
//!
//! Pure consumer of a completed sweep directory. Produces the
//! `MetricsResult` artifact: per-axis ESI and justification drift against
//! the baseline run, axes alphabetical, every float quantized.
//!
//! ## What belongs here
//! * Trace-pack answer/justification extraction
//! * Character-level Levenshtein distance
//! * ESI and drift aggregation
//!
//! ## What does NOT belong here
//! * Sweep execution (clarity-sweep)
//! * Surface construction (clarity-surface)

pub mod levenshtein;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use clarity_canon::stats::mean;
use clarity_canon::{SerializationError, quantize};
use clarity_types::surface::{DriftMetric, EsiMetric, MetricsResult};
use clarity_types::{ExtractedAnswer, SweepManifest, extract_justification};

pub use levenshtein::{levenshtein as edit_distance, normalized_levenshtein};

/// Artifact path of the metrics result, relative to the sweep root.
pub const METRICS_FILE: &str = "metrics/metrics.json";

/// Failures of metric computation. Every variant names the run or file
/// that broke the sweep's contract.
#[derive(Debug, Error)]
pub enum MetricComputationError {
    #[error("sweep manifest unreadable at {path}: {reason}")]
    ManifestUnreadable { path: PathBuf, reason: String },

    #[error("sweep is empty: no perturbed runs to score")]
    EmptySweep,

    #[error("manifest baseline_run {declared} does not match runs[0] {actual}")]
    MissingBaseline { declared: String, actual: String },

    #[error("trace pack missing or unreadable for run {run_key} at {path}: {reason}")]
    MissingTracePack {
        run_key: String,
        path: PathBuf,
        reason: String,
    },

    #[error("trace pack for run {run_key} has no records")]
    EmptyTracePack { run_key: String },

    #[error("no extractable answer in the last trace record of run {run_key}")]
    NoExtractableAnswer { run_key: String },

    #[error("manifest is inconsistent: {detail}")]
    InconsistentManifest { detail: String },

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// Extracted scoring inputs for one run.
#[derive(Debug, Clone)]
struct RunReading {
    answer: String,
    justification: String,
}

/// The metrics engine. Stateless; `compute` is a pure function of the
/// sweep directory contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsEngine;

impl MetricsEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compute ESI and drift for every `(axis, value)` of a completed
    /// sweep. The baseline is strictly `runs[0]`.
    pub fn compute(&self, sweep_dir: &Path) -> Result<MetricsResult, MetricComputationError> {
        let manifest = read_manifest(sweep_dir)?;
        if manifest.runs.len() <= 1 || manifest.axes.is_empty() {
            return Err(MetricComputationError::EmptySweep);
        }
        if manifest.baseline_run != manifest.runs[0].run_key {
            return Err(MetricComputationError::MissingBaseline {
                declared: manifest.baseline_run.clone(),
                actual: manifest.runs[0].run_key.clone(),
            });
        }

        let mut readings: BTreeMap<String, RunReading> = BTreeMap::new();
        for run in &manifest.runs {
            readings.insert(run.run_key.clone(), read_run(sweep_dir, &run.trace_path, &run.run_key)?);
        }
        let baseline = readings
            .get(&manifest.runs[0].run_key)
            .cloned()
            .ok_or_else(|| MetricComputationError::InconsistentManifest {
                detail: format!("baseline run {} has no reading", manifest.runs[0].run_key),
            })?;

        let mut esi = Vec::with_capacity(manifest.axes.len());
        let mut drift = Vec::with_capacity(manifest.axes.len());
        for axis in &manifest.axes {
            let values = manifest.values.get(axis).ok_or_else(|| {
                MetricComputationError::InconsistentManifest {
                    detail: format!("axis {axis} declares no values"),
                }
            })?;

            let mut esi_scores = BTreeMap::new();
            let mut drift_scores = BTreeMap::new();
            for value in values {
                let mut matches = 0usize;
                let mut distances = Vec::with_capacity(manifest.seeds.len());
                for seed in &manifest.seeds {
                    let run_key = format!("{axis}/{value}/{seed}");
                    let reading = readings.get(&run_key).ok_or_else(|| {
                        MetricComputationError::InconsistentManifest {
                            detail: format!("run {run_key} is declared but absent"),
                        }
                    })?;
                    if reading.answer == baseline.answer {
                        matches += 1;
                    }
                    distances.push(normalized_levenshtein(
                        &reading.justification,
                        &baseline.justification,
                    ));
                }
                let proportion = matches as f64 / manifest.seeds.len() as f64;
                esi_scores.insert(value.clone(), quantize(proportion)?);
                drift_scores.insert(value.clone(), quantize(mean(&distances))?);
            }

            let esi_values: Vec<f64> = esi_scores.values().copied().collect();
            let drift_values: Vec<f64> = drift_scores.values().copied().collect();
            esi.push(EsiMetric {
                axis: axis.clone(),
                value_scores: esi_scores,
                overall_score: quantize(mean(&esi_values))?,
            });
            drift.push(DriftMetric {
                axis: axis.clone(),
                value_scores: drift_scores,
                overall_score: quantize(mean(&drift_values))?,
            });
        }

        Ok(MetricsResult { esi, drift })
    }
}

fn read_manifest(sweep_dir: &Path) -> Result<SweepManifest, MetricComputationError> {
    let path = sweep_dir.join("sweep_manifest.json");
    let bytes = std::fs::read(&path).map_err(|err| MetricComputationError::ManifestUnreadable {
        path: path.clone(),
        reason: err.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|err| MetricComputationError::ManifestUnreadable {
        path,
        reason: err.to_string(),
    })
}

/// Read the last trace record of a run and extract its scoring inputs.
fn read_run(
    sweep_dir: &Path,
    trace_path: &str,
    run_key: &str,
) -> Result<RunReading, MetricComputationError> {
    let path = sweep_dir.join(trace_path);
    let text =
        std::fs::read_to_string(&path).map_err(|err| MetricComputationError::MissingTracePack {
            run_key: run_key.to_string(),
            path: path.clone(),
            reason: err.to_string(),
        })?;

    let last_line = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .next_back()
        .ok_or_else(|| MetricComputationError::EmptyTracePack {
            run_key: run_key.to_string(),
        })?;
    let record: serde_json::Value =
        serde_json::from_str(last_line).map_err(|err| MetricComputationError::MissingTracePack {
            run_key: run_key.to_string(),
            path,
            reason: err.to_string(),
        })?;

    let answer = match ExtractedAnswer::from_record(&record) {
        ExtractedAnswer::FromOutput(text) | ExtractedAnswer::FromAnswer(text) => text,
        ExtractedAnswer::Missing => {
            return Err(MetricComputationError::NoExtractableAnswer {
                run_key: run_key.to_string(),
            });
        }
    };
    Ok(RunReading {
        answer,
        justification: extract_justification(&record),
    })
}
