//! # clarity-bundle
//!
//! **Tier 2 (Sealing)**
//!
//! The tamper-evidence layer. Reads the canonical artifact list as bytes,
//! normalizes CRLF→LF, hashes each file, digests the ordered concatenation
//! into the bundle SHA-256, and emits `checksums.json`. Verification
//! recomputes everything and names the first divergence.
//!
//! ## What belongs here
//! * The canonical artifact list and its order
//! * Sealing and verification
//!
//! ## What does NOT belong here
//! * Producing artifacts (upstream engines)
//! * Any hash other than SHA-256 after LF normalization

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use clarity_canon::{
    SerializationError, normalize_newlines, sha256_hex, sha256_hex_normalized,
    write_canonical_file,
};
use clarity_types::bundle::ChecksumManifest;

/// Checksum manifest filename at the sweep root.
pub const CHECKSUMS_FILE: &str = "checksums.json";

/// The canonical artifact list, in concatenation order. Every bundle hash
/// is computed over exactly these files; changing the list or its order is
/// a breaking change to the reproducibility receipt.
pub const CANONICAL_ARTIFACTS: [&str; 4] = [
    "sweep_manifest.json",
    "surface/robustness_surface.json",
    "surface/confidence_surface.json",
    "surface/entropy_surface.json",
];

/// Failures of sealing or verification.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("canonical artifact missing: {path}")]
    MissingArtifact { path: PathBuf },

    #[error("io failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checksums manifest unreadable at {path}: {reason}")]
    MalformedChecksums { path: PathBuf, reason: String },

    #[error("checksum mismatch for {file}: stored {stored}, recomputed {recomputed}")]
    ChecksumMismatch {
        file: String,
        stored: String,
        recomputed: String,
    },

    #[error("bundle hash mismatch: stored {stored}, recomputed {recomputed}")]
    BundleMismatch { stored: String, recomputed: String },

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// Hash the canonical list and write `checksums.json` at the sweep root.
pub fn seal(sweep_root: &Path) -> Result<ChecksumManifest, IntegrityError> {
    let manifest = compute_checksums(sweep_root)?;
    write_canonical_file(&sweep_root.join(CHECKSUMS_FILE), &manifest)?;
    info!(bundle_sha256 = %manifest.bundle_sha256, "bundle sealed");
    Ok(manifest)
}

/// Recompute every digest and compare against the stored `checksums.json`.
///
/// Fails on the first divergent file, then on the bundle digest. Returns
/// the verified manifest so consumers can surface the receipt.
pub fn verify(sweep_root: &Path) -> Result<ChecksumManifest, IntegrityError> {
    let path = sweep_root.join(CHECKSUMS_FILE);
    let bytes = std::fs::read(&path).map_err(|err| IntegrityError::MalformedChecksums {
        path: path.clone(),
        reason: err.to_string(),
    })?;
    let stored: ChecksumManifest =
        serde_json::from_slice(&bytes).map_err(|err| IntegrityError::MalformedChecksums {
            path,
            reason: err.to_string(),
        })?;

    let recomputed = compute_checksums(sweep_root)?;
    for (file, digest) in &recomputed.files {
        match stored.files.get(file) {
            Some(stored_digest) if stored_digest.eq_ignore_ascii_case(digest) => {}
            Some(stored_digest) => {
                return Err(IntegrityError::ChecksumMismatch {
                    file: file.clone(),
                    stored: stored_digest.clone(),
                    recomputed: digest.clone(),
                });
            }
            None => {
                return Err(IntegrityError::ChecksumMismatch {
                    file: file.clone(),
                    stored: "<absent>".to_string(),
                    recomputed: digest.clone(),
                });
            }
        }
    }
    if !stored
        .bundle_sha256
        .eq_ignore_ascii_case(&recomputed.bundle_sha256)
    {
        return Err(IntegrityError::BundleMismatch {
            stored: stored.bundle_sha256,
            recomputed: recomputed.bundle_sha256,
        });
    }
    Ok(recomputed)
}

/// Compute the bundle hash alone, without touching `checksums.json`.
pub fn bundle_sha256(sweep_root: &Path) -> Result<String, IntegrityError> {
    Ok(compute_checksums(sweep_root)?.bundle_sha256)
}

fn compute_checksums(sweep_root: &Path) -> Result<ChecksumManifest, IntegrityError> {
    let mut files = BTreeMap::new();
    let mut concatenated = Vec::new();
    for artifact in CANONICAL_ARTIFACTS {
        let path = sweep_root.join(artifact);
        if !path.is_file() {
            return Err(IntegrityError::MissingArtifact { path });
        }
        let bytes = std::fs::read(&path).map_err(|source| IntegrityError::Io { path, source })?;
        let normalized = normalize_newlines(&bytes);
        files.insert(artifact.to_string(), sha256_hex(&normalized));
        concatenated.extend_from_slice(&normalized);
    }
    Ok(ChecksumManifest {
        files,
        bundle_sha256: sha256_hex(&concatenated),
    })
}

/// Digest of one artifact after LF normalization; exposed for consumers
/// that spot-check a single file.
pub fn artifact_sha256(sweep_root: &Path, artifact: &str) -> Result<String, IntegrityError> {
    let path = sweep_root.join(artifact);
    let bytes = std::fs::read(&path).map_err(|source| IntegrityError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(sha256_hex_normalized(&bytes))
}
