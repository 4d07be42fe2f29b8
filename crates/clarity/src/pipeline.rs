//! The end-to-end pipeline: sweep → metrics → surfaces → gradient →
//! optional counterfactual probes → optional overlay → seal.
//!
//! Each stage consumes the immutable output of the previous one and writes
//! into its own subdirectory of the sweep root; no stage ever writes above
//! its assigned subpath. The pipeline runs strictly sequentially.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use clarity_adapter::ModelAdapter;
use clarity_bundle::seal;
use clarity_canon::stats::mean;
use clarity_canon::{quantize, write_canonical_file};
use clarity_counterfactual::{CounterfactualEngine, PROBE_RUNS_DIR, PROBE_SURFACE_FILE};
use clarity_metrics::{METRICS_FILE, MetricsEngine};
use clarity_overlay::{OVERLAY_BUNDLE_FILE, OverlayEngine};
use clarity_surface::gradient::GRADIENT_SURFACE_FILE;
use clarity_surface::{
    CONFIDENCE_SURFACE_FILE, ENTROPY_SURFACE_FILE, GradientEngine, ROBUSTNESS_SURFACE_FILE,
    SurfaceEngine,
};
use clarity_sweep::SweepOrchestrator;
use clarity_types::overlay::EvidenceMap;
use clarity_types::{AdapterResponse, BASELINE_AXIS, SweepManifest, SweepSpec};

use crate::ClarityError;

/// Pipeline knobs beyond the sweep spec itself.
#[derive(Debug, Clone, Default)]
pub struct EvaluationOptions {
    /// Run the counterfactual probe over a `k×k` grid. `None` skips
    /// probing; every probe multiplies the sweep cost by one.
    pub counterfactual_grid: Option<usize>,
}

/// What the pipeline produced, for callers that log or chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub sweep_root: PathBuf,
    pub run_count: usize,
    pub probe_count: usize,
    /// Region count of the overlay bundle, when an evidence map was
    /// available.
    pub overlay_regions: Option<usize>,
    pub bundle_sha256: String,
}

/// Run the full evaluation into an empty (or absent) sweep root.
pub fn evaluate(
    spec: &SweepSpec,
    adapter: &dyn ModelAdapter,
    sweep_root: &Path,
    options: &EvaluationOptions,
) -> Result<EvaluationSummary, ClarityError> {
    let orchestrator = SweepOrchestrator::new(adapter);
    let manifest = orchestrator.run(spec, sweep_root)?;

    let metrics_engine = MetricsEngine::new();
    let metrics = metrics_engine.compute(sweep_root)?;
    write_artifact(sweep_root, METRICS_FILE, &metrics)?;

    let surface_engine = SurfaceEngine::new();
    let surface = surface_engine.compute(&metrics)?;
    write_artifact(sweep_root, ROBUSTNESS_SURFACE_FILE, &surface)?;

    let rich_scores = collect_rich_scores(sweep_root, &manifest)?;
    let confidence = surface_engine.compute_scalar("confidence", &rich_scores.confidence)?;
    write_artifact(sweep_root, CONFIDENCE_SURFACE_FILE, &confidence)?;
    let entropy = surface_engine.compute_scalar("entropy", &rich_scores.entropy)?;
    write_artifact(sweep_root, ENTROPY_SURFACE_FILE, &entropy)?;

    let gradient = GradientEngine::new().compute(&surface)?;
    write_artifact(sweep_root, GRADIENT_SURFACE_FILE, &gradient)?;

    let mut probe_count = 0;
    if let Some(grid_k) = options.counterfactual_grid {
        let probes = CounterfactualEngine::new().probe(
            &spec.image_bytes,
            spec,
            grid_k,
            &orchestrator,
            &metrics_engine,
            &metrics,
            &sweep_root.join(PROBE_RUNS_DIR),
        )?;
        probe_count = probes.results.len();
        write_artifact(sweep_root, PROBE_SURFACE_FILE, &probes)?;
    }

    let overlay_regions = match baseline_evidence(sweep_root, &manifest)? {
        Some(map) => {
            let bundle = OverlayEngine::new().build_bundle(&map)?;
            write_artifact(sweep_root, OVERLAY_BUNDLE_FILE, &bundle)?;
            Some(bundle.regions.len())
        }
        None => None,
    };

    let sealed = seal(sweep_root)?;
    info!(
        run_id = %spec.run_id,
        runs = manifest.runs.len(),
        probes = probe_count,
        bundle_sha256 = %sealed.bundle_sha256,
        "evaluation complete"
    );
    Ok(EvaluationSummary {
        sweep_root: sweep_root.to_path_buf(),
        run_count: manifest.runs.len(),
        probe_count,
        overlay_regions,
        bundle_sha256: sealed.bundle_sha256,
    })
}

fn write_artifact<T: serde::Serialize>(
    sweep_root: &Path,
    rel: &str,
    value: &T,
) -> Result<(), ClarityError> {
    let path = sweep_root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| ClarityError::Artifact {
            path: parent.to_path_buf(),
            reason: err.to_string(),
        })?;
    }
    write_canonical_file(&path, value)?;
    Ok(())
}

struct RichScores {
    confidence: BTreeMap<String, BTreeMap<String, f64>>,
    entropy: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Mean per-`(axis, value)` confidence and entropy across seeds, from the
/// per-run responses. A sweep without rich signals yields empty maps and
/// therefore empty scalar surfaces.
fn collect_rich_scores(
    sweep_root: &Path,
    manifest: &SweepManifest,
) -> Result<RichScores, ClarityError> {
    let mut confidence_samples: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
    let mut entropy_samples: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();

    for run in &manifest.runs {
        if run.axis == BASELINE_AXIS {
            continue;
        }
        let response = read_response(sweep_root, &run.response_path)?;
        if let Some(rich) = response.rich {
            let key = (run.axis.clone(), run.value.clone());
            confidence_samples
                .entry(key.clone())
                .or_default()
                .push(rich.confidence);
            entropy_samples
                .entry(key)
                .or_default()
                .push(rich.output_entropy);
        }
    }

    Ok(RichScores {
        confidence: fold_means(confidence_samples)?,
        entropy: fold_means(entropy_samples)?,
    })
}

fn fold_means(
    samples: BTreeMap<(String, String), Vec<f64>>,
) -> Result<BTreeMap<String, BTreeMap<String, f64>>, ClarityError> {
    let mut out: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for ((axis, value), scores) in samples {
        out.entry(axis)
            .or_default()
            .insert(value, quantize(mean(&scores))?);
    }
    Ok(out)
}

/// The baseline run's evidence map, if the adapter produced one.
fn baseline_evidence(
    sweep_root: &Path,
    manifest: &SweepManifest,
) -> Result<Option<EvidenceMap>, ClarityError> {
    let baseline = &manifest.runs[0];
    let response = read_response(sweep_root, &baseline.response_path)?;
    Ok(response.rich.and_then(|rich| rich.evidence_map))
}

fn read_response(sweep_root: &Path, rel: &str) -> Result<AdapterResponse, ClarityError> {
    let path = sweep_root.join(rel);
    let bytes = std::fs::read(&path).map_err(|err| ClarityError::Artifact {
        path: path.clone(),
        reason: err.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|err| ClarityError::Artifact {
        path,
        reason: err.to_string(),
    })
}
