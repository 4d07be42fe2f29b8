//! Checksum manifest types for the sealed bundle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `checksums.json`: per-artifact SHA-256 after LF normalization, plus the
/// bundle digest over the normalized concatenation of the canonical list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumManifest {
    /// Sweep-root-relative canonical filename → lowercase hex SHA-256.
    pub files: BTreeMap<String, String>,
    /// The cross-platform reproducibility receipt.
    pub bundle_sha256: String,
}
