//! # clarity-sweep
//!
//! **Tier 1 (Orchestration)**
//!
//! Owns the sweep directory: runs the baseline and every grid cell in
//! canonical order, writes per-run artifacts, and emits the manifest last.
//! Downstream engines are pure consumers of what this crate writes.
//!
//! ## What belongs here
//! * Spec validation and canonical grid enumeration
//! * Per-run artifact emission and the manifest
//! * Fail-fast single-run error wrapping
//!
//! ## What does NOT belong here
//! * Metric computation (clarity-metrics)
//! * Backend selection (clarity-adapter)
//! * Retries or parallelism: retry is a caller concern, and concurrent
//!   adapter calls would race the process-global seeding discipline

pub mod grid;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use clarity_adapter::{AdapterError, ModelAdapter, rich_mode_enabled};
use clarity_canon::{SerializationError, write_canonical_file, write_jsonl_file};
use clarity_image::{PerturbationError, Raster};
use clarity_types::{
    AdapterResponse, BASELINE_AXIS, RunRecord, SweepManifest, SweepSpec, TraceRecord,
};

/// Manifest filename at the sweep root.
pub const MANIFEST_FILE: &str = "sweep_manifest.json";

/// Directory of the unperturbed baseline run.
pub const BASELINE_DIR: &str = "baseline";

/// Parent directory of all perturbed runs.
pub const RUNS_DIR: &str = "runs";

/// Value string recorded for the baseline run.
pub const BASELINE_VALUE: &str = "none";

/// Failures of sweep orchestration. A single-run failure identifies the
/// offending `(axis, value, seed)` and wraps the underlying error; partial
/// output stays on disk for diagnosis.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("invalid sweep spec: {reason}")]
    InvalidSpec { reason: String },

    #[error("output directory {path} is not empty")]
    OutputDirNotEmpty { path: PathBuf },

    #[error("io failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("baseline image rejected: {source}")]
    Baseline {
        #[source]
        source: PerturbationError,
    },

    #[error("run {axis}/{value}/seed {seed} failed: {source}")]
    Run {
        axis: String,
        value: String,
        seed: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

impl SweepError {
    fn run_failure(
        axis: &str,
        value: &str,
        seed: u64,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Run {
            axis: axis.to_string(),
            value: value.to_string(),
            seed,
            source: Box::new(source),
        }
    }
}

/// The sweep orchestrator. Holds the resolved backend; one instance can run
/// many sweeps (the counterfactual engine reuses it per region).
pub struct SweepOrchestrator<'a> {
    adapter: &'a dyn ModelAdapter,
}

impl<'a> SweepOrchestrator<'a> {
    pub fn new(adapter: &'a dyn ModelAdapter) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &dyn ModelAdapter {
        self.adapter
    }

    /// Run the full sweep into an empty (or absent) output directory.
    ///
    /// Runs execute strictly sequentially in canonical order: baseline
    /// first, then axes alphabetical, values declared, seeds declared. The
    /// manifest is written last, so its presence marks a complete sweep.
    pub fn run(&self, spec: &SweepSpec, output_dir: &Path) -> Result<SweepManifest, SweepError> {
        validate_spec(spec)?;
        prepare_output_dir(output_dir)?;

        let baseline = Raster::decode(&spec.image_bytes)
            .map_err(|source| SweepError::Baseline { source })?;
        let baseline_png = baseline
            .encode_png()
            .map_err(|source| SweepError::Baseline { source })?;
        let rich = rich_mode_enabled(spec.rich_mode);

        info!(
            run_id = %spec.run_id,
            axes = spec.axes.len(),
            seeds = spec.seeds.len(),
            rich,
            "sweep started"
        );

        let mut runs = Vec::new();
        runs.push(self.execute_run(
            spec,
            output_dir,
            BASELINE_AXIS,
            BASELINE_VALUE,
            spec.seeds[0],
            BASELINE_DIR,
            &baseline_png,
            rich,
        )?);

        for point in grid::enumerate(spec)? {
            let perturbed = clarity_image::apply(&baseline, point.kind, point.value)
                .and_then(|raster| raster.encode_png())
                .map_err(|source| {
                    SweepError::run_failure(&point.axis, &point.value_encoded, point.seed, source)
                })?;
            let rel_dir = format!(
                "{RUNS_DIR}/{}/{}/{}",
                point.axis, point.value_encoded, point.seed
            );
            runs.push(self.execute_run(
                spec,
                output_dir,
                &point.axis,
                &point.value_encoded,
                point.seed,
                &rel_dir,
                &perturbed,
                rich,
            )?);
        }

        let manifest = build_manifest(spec, rich, runs)?;
        write_canonical_file(&output_dir.join(MANIFEST_FILE), &manifest)?;
        info!(run_id = %spec.run_id, runs = manifest.runs.len(), "sweep complete");
        Ok(manifest)
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_run(
        &self,
        spec: &SweepSpec,
        output_dir: &Path,
        axis: &str,
        value: &str,
        seed: u64,
        rel_dir: &str,
        image_png: &[u8],
        rich: bool,
    ) -> Result<RunRecord, SweepError> {
        debug!(axis, value, seed, "run started");
        let run_dir = output_dir.join(rel_dir);
        std::fs::create_dir_all(&run_dir).map_err(|source| SweepError::Io {
            path: run_dir.clone(),
            source,
        })?;

        let image_path = run_dir.join("image.png");
        std::fs::write(&image_path, image_png).map_err(|source| SweepError::Io {
            path: image_path,
            source,
        })?;

        let response = self
            .invoke_adapter(&spec.prompt, image_png, seed, rich)
            .map_err(|source| SweepError::run_failure(axis, value, seed, source))?;
        write_canonical_file(&run_dir.join("response.json"), &response)?;

        let records = trace_records(&response, self.adapter.adapter_id());
        write_jsonl_file(&run_dir.join("trace_pack.jsonl"), &records)?;

        let run_key = if axis == BASELINE_AXIS {
            BASELINE_AXIS.to_string()
        } else {
            format!("{axis}/{value}/{seed}")
        };
        Ok(RunRecord {
            run_key,
            axis: axis.to_string(),
            value: value.to_string(),
            seed,
            image_path: format!("{rel_dir}/image.png"),
            response_path: format!("{rel_dir}/response.json"),
            trace_path: format!("{rel_dir}/trace_pack.jsonl"),
        })
    }

    fn invoke_adapter(
        &self,
        prompt: &str,
        image_png: &[u8],
        seed: u64,
        rich: bool,
    ) -> Result<AdapterResponse, AdapterError> {
        if rich {
            self.adapter.generate_rich(prompt, image_png, seed)
        } else {
            let text = self.adapter.generate(prompt, image_png, seed)?;
            Ok(AdapterResponse { text, rich: None })
        }
    }
}

/// One record per decoding step, then a final record carrying the split
/// answer and justification.
fn trace_records(response: &AdapterResponse, adapter_id: &str) -> Vec<TraceRecord> {
    let mut records = Vec::new();
    if let Some(rich) = &response.rich {
        for (index, logprob) in rich.token_logprobs.iter().enumerate() {
            records.push(TraceRecord {
                logprob: Some(*logprob),
                ..TraceRecord::step(index as u64)
            });
        }
    }
    let (answer, justification) = response.split_text();
    records.push(TraceRecord {
        step_id: records.len() as u64,
        logprob: None,
        output: Some(answer),
        justification: Some(justification),
        adapter_metadata: Some(serde_json::json!({ "adapter_id": adapter_id })),
    });
    records
}

fn validate_spec(spec: &SweepSpec) -> Result<(), SweepError> {
    let invalid = |reason: String| Err(SweepError::InvalidSpec { reason });
    if spec.run_id.is_empty() {
        return invalid("run_id must not be empty".to_string());
    }
    if spec.axes.is_empty() {
        return invalid("at least one perturbation axis is required".to_string());
    }
    if spec.seeds.is_empty() {
        return invalid("at least one seed is required".to_string());
    }
    let mut seen_seeds = BTreeSet::new();
    for seed in &spec.seeds {
        if !seen_seeds.insert(*seed) {
            return invalid(format!("duplicate seed {seed}"));
        }
    }
    let mut seen_axes = BTreeSet::new();
    for axis in &spec.axes {
        if !seen_axes.insert(axis.kind.as_str()) {
            return invalid(format!("duplicate axis {}", axis.kind.as_str()));
        }
        if axis.values.is_empty() {
            return invalid(format!("axis {} has no values", axis.kind.as_str()));
        }
        let mut seen_values = BTreeSet::new();
        for value in &axis.values {
            let encoded = clarity_types::encode_axis_value(*value)
                .map_err(|err| SweepError::InvalidSpec {
                    reason: err.to_string(),
                })?;
            if !seen_values.insert(encoded.clone()) {
                return invalid(format!(
                    "axis {} declares value {encoded} twice",
                    axis.kind.as_str()
                ));
            }
        }
    }
    Ok(())
}

fn prepare_output_dir(path: &Path) -> Result<(), SweepError> {
    std::fs::create_dir_all(path).map_err(|source| SweepError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut entries = std::fs::read_dir(path).map_err(|source| SweepError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if entries.next().is_some() {
        return Err(SweepError::OutputDirNotEmpty {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn build_manifest(
    spec: &SweepSpec,
    rich: bool,
    runs: Vec<RunRecord>,
) -> Result<SweepManifest, SweepError> {
    let mut axes: Vec<String> = spec
        .axes
        .iter()
        .map(|axis| axis.kind.as_str().to_string())
        .collect();
    axes.sort_unstable();

    let mut values = BTreeMap::new();
    for axis in &spec.axes {
        let encoded: Result<Vec<String>, _> = axis
            .values
            .iter()
            .map(|value| clarity_types::encode_axis_value(*value))
            .collect();
        values.insert(
            axis.kind.as_str().to_string(),
            encoded.map_err(|err| SweepError::InvalidSpec {
                reason: err.to_string(),
            })?,
        );
    }

    let baseline_run = runs[0].run_key.clone();
    Ok(SweepManifest {
        run_id: spec.run_id.clone(),
        timestamp: spec.timestamp.clone(),
        seeds: spec.seeds.clone(),
        axes,
        values,
        runs,
        baseline_run,
        adapter_metadata: Some(serde_json::json!({
            "adapter_id": spec.adapter_id,
            "rich_mode": rich,
        })),
    })
}
