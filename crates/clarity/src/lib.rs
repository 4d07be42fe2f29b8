//! # clarity
//!
//! **Tier 3 (Facade)**
//!
//! End-to-end driver over the engine crates, plus the read-only consumer
//! surface for the report/UI/demo collaborators.
//!
//! ```no_run
//! use clarity::{EvaluationOptions, evaluate};
//! use clarity_adapter::StubAdapter;
//! use clarity_types::{PerturbationAxis, PerturbationKind, SweepSpec};
//!
//! let spec = SweepSpec {
//!     run_id: "demo-001".into(),
//!     timestamp: "2026-02-11T09:00:00Z".into(),
//!     prompt: "Is there an acute abnormality?".into(),
//!     image_bytes: std::fs::read("chest.png").unwrap(),
//!     axes: vec![PerturbationAxis::new(
//!         PerturbationKind::Brightness,
//!         vec![0.8, 1.0, 1.2],
//!     )],
//!     seeds: vec![42, 123],
//!     adapter_id: "stub".into(),
//!     rich_mode: true,
//! };
//! let adapter = StubAdapter::new();
//! let summary = evaluate(
//!     &spec,
//!     &adapter,
//!     "out/demo-001".as_ref(),
//!     &EvaluationOptions::default(),
//! )
//! .unwrap();
//! println!("bundle sha256: {}", summary.bundle_sha256);
//! ```

pub mod pipeline;
pub mod reader;

use std::path::PathBuf;

use thiserror::Error;

use clarity_adapter::AdapterError;
use clarity_canon::SerializationError;
use clarity_counterfactual::CounterfactualComputationError;
use clarity_image::PerturbationError;
use clarity_metrics::MetricComputationError;
use clarity_overlay::OverlayComputationError;
use clarity_surface::{GradientComputationError, SurfaceComputationError};
use clarity_sweep::SweepError;

pub use clarity_bundle::IntegrityError;
pub use pipeline::{EvaluationOptions, EvaluationSummary, evaluate};
pub use reader::BundleReader;

/// Umbrella error over every engine failure the pipeline can surface.
///
/// Each variant wraps the structured error of its engine; nothing is
/// swallowed or retried. The only user-visible failure mode is "the sweep
/// did not complete; here is which run and why."
#[derive(Debug, Error)]
pub enum ClarityError {
    #[error(transparent)]
    Sweep(#[from] SweepError),

    #[error(transparent)]
    Metrics(#[from] MetricComputationError),

    #[error(transparent)]
    Surface(#[from] SurfaceComputationError),

    #[error(transparent)]
    Gradient(#[from] GradientComputationError),

    #[error(transparent)]
    Counterfactual(#[from] CounterfactualComputationError),

    #[error(transparent)]
    Overlay(#[from] OverlayComputationError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Perturbation(#[from] PerturbationError),

    #[error("artifact io failure at {path}: {reason}")]
    Artifact { path: PathBuf, reason: String },

    #[error("path {path} escapes the sweep root")]
    PathEscapesRoot { path: String },
}
