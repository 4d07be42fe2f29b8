//! Read-only access to a sealed sweep root for the report, UI, and demo
//! collaborators.
//!
//! The reader is path-jailed: every read resolves strictly inside the
//! sweep root, with absolute paths and parent-directory components
//! rejected before touching the filesystem. Nothing here mutates the
//! bundle.

use std::path::{Component, Path, PathBuf};

use serde::de::DeserializeOwned;

use clarity_bundle::CHECKSUMS_FILE;
use clarity_bundle::verify;
use clarity_counterfactual::PROBE_SURFACE_FILE;
use clarity_metrics::METRICS_FILE;
use clarity_overlay::OVERLAY_BUNDLE_FILE;
use clarity_surface::gradient::GRADIENT_SURFACE_FILE;
use clarity_surface::{CONFIDENCE_SURFACE_FILE, ENTROPY_SURFACE_FILE, ROBUSTNESS_SURFACE_FILE};
use clarity_sweep::MANIFEST_FILE;
use clarity_types::bundle::ChecksumManifest;
use clarity_types::overlay::OverlayBundle;
use clarity_types::probe::ProbeSurface;
use clarity_types::surface::{GradientSurface, MetricsResult, RobustnessSurface, ScalarSurface};
use clarity_types::SweepManifest;

use crate::ClarityError;

/// A read-only view over one sealed sweep root.
#[derive(Debug, Clone)]
pub struct BundleReader {
    root: PathBuf,
}

impl BundleReader {
    /// Open a sweep root. The manifest must exist; anything else is read
    /// lazily.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ClarityError> {
        let root = root.into();
        let manifest = root.join(MANIFEST_FILE);
        if !manifest.is_file() {
            return Err(ClarityError::Artifact {
                path: manifest,
                reason: "sweep manifest not found; is this a sweep root?".to_string(),
            });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a root-relative artifact exists.
    pub fn exists(&self, rel: &str) -> bool {
        self.resolve(rel)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Raw bytes of any root-relative artifact.
    pub fn read_bytes(&self, rel: &str) -> Result<Vec<u8>, ClarityError> {
        let path = self.resolve(rel)?;
        std::fs::read(&path).map_err(|err| ClarityError::Artifact {
            path,
            reason: err.to_string(),
        })
    }

    pub fn manifest(&self) -> Result<SweepManifest, ClarityError> {
        self.decode(MANIFEST_FILE)
    }

    pub fn metrics(&self) -> Result<MetricsResult, ClarityError> {
        self.decode(METRICS_FILE)
    }

    pub fn robustness_surface(&self) -> Result<RobustnessSurface, ClarityError> {
        self.decode(ROBUSTNESS_SURFACE_FILE)
    }

    pub fn confidence_surface(&self) -> Result<ScalarSurface, ClarityError> {
        self.decode(CONFIDENCE_SURFACE_FILE)
    }

    pub fn entropy_surface(&self) -> Result<ScalarSurface, ClarityError> {
        self.decode(ENTROPY_SURFACE_FILE)
    }

    pub fn gradient_surface(&self) -> Result<GradientSurface, ClarityError> {
        self.decode(GRADIENT_SURFACE_FILE)
    }

    pub fn probe_surface(&self) -> Result<ProbeSurface, ClarityError> {
        self.decode(PROBE_SURFACE_FILE)
    }

    pub fn overlay_bundle(&self) -> Result<OverlayBundle, ClarityError> {
        self.decode(OVERLAY_BUNDLE_FILE)
    }

    pub fn checksums(&self) -> Result<ChecksumManifest, ClarityError> {
        self.decode(CHECKSUMS_FILE)
    }

    /// Recompute the bundle hash from the canonical file list and confirm
    /// it matches the sealed `checksums.json`.
    pub fn verify(&self) -> Result<ChecksumManifest, ClarityError> {
        Ok(verify(&self.root)?)
    }

    fn decode<T: DeserializeOwned>(&self, rel: &str) -> Result<T, ClarityError> {
        let bytes = self.read_bytes(rel)?;
        serde_json::from_slice(&bytes).map_err(|err| ClarityError::Artifact {
            path: self.root.join(rel),
            reason: err.to_string(),
        })
    }

    fn resolve(&self, rel: &str) -> Result<PathBuf, ClarityError> {
        let candidate = Path::new(rel);
        let escapes = candidate.is_absolute()
            || candidate
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(ClarityError::PathEscapesRoot {
                path: rel.to_string(),
            });
        }
        Ok(self.root.join(candidate))
    }
}
