//! Unit tests for sealing and verification over synthetic sweep roots.

use std::path::Path;

use clarity_bundle::{
    CANONICAL_ARTIFACTS, CHECKSUMS_FILE, IntegrityError, artifact_sha256, bundle_sha256, seal,
    verify,
};

/// Lay down the four canonical artifacts with fixed contents.
fn write_artifacts(root: &Path) {
    for (index, artifact) in CANONICAL_ARTIFACTS.iter().enumerate() {
        let path = root.join(artifact);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, format!("{{\"artifact\":{index}}}")).unwrap();
    }
}

// ── Sealing ─────────────────────────────────────────────────────────────────

#[test]
fn seal_writes_checksums_and_covers_every_canonical_artifact() {
    let dir = tempfile::tempdir().unwrap();
    write_artifacts(dir.path());
    let manifest = seal(dir.path()).unwrap();

    assert!(dir.path().join(CHECKSUMS_FILE).is_file());
    assert_eq!(manifest.files.len(), CANONICAL_ARTIFACTS.len());
    for artifact in CANONICAL_ARTIFACTS {
        assert_eq!(
            manifest.files[artifact],
            artifact_sha256(dir.path(), artifact).unwrap()
        );
    }
    assert_eq!(manifest.bundle_sha256.len(), 64);
}

#[test]
fn sealing_twice_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    write_artifacts(dir.path());
    let first = seal(dir.path()).unwrap();
    // Resealing reads the same artifacts; checksums.json itself is not in
    // the canonical list, so the bundle hash cannot feed back on itself.
    let second = seal(dir.path()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn identical_roots_share_a_bundle_hash() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    write_artifacts(dir_a.path());
    write_artifacts(dir_b.path());
    assert_eq!(
        bundle_sha256(dir_a.path()).unwrap(),
        bundle_sha256(dir_b.path()).unwrap()
    );
}

#[test]
fn crlf_and_lf_roots_share_a_bundle_hash() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    write_artifacts(dir_a.path());
    write_artifacts(dir_b.path());
    // Rewrite one artifact with CRLF line endings in dir_b.
    let path = dir_b.path().join(CANONICAL_ARTIFACTS[0]);
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, format!("{text}\r\n")).unwrap();
    let path_a = dir_a.path().join(CANONICAL_ARTIFACTS[0]);
    let text_a = std::fs::read_to_string(&path_a).unwrap();
    std::fs::write(&path_a, format!("{text_a}\n")).unwrap();

    assert_eq!(
        bundle_sha256(dir_a.path()).unwrap(),
        bundle_sha256(dir_b.path()).unwrap()
    );
}

#[test]
fn missing_artifact_fails_sealing() {
    let dir = tempfile::tempdir().unwrap();
    write_artifacts(dir.path());
    std::fs::remove_file(dir.path().join("surface/entropy_surface.json")).unwrap();
    assert!(matches!(
        seal(dir.path()),
        Err(IntegrityError::MissingArtifact { .. })
    ));
}

// ── Verification ────────────────────────────────────────────────────────────

#[test]
fn verify_accepts_an_untouched_root() {
    let dir = tempfile::tempdir().unwrap();
    write_artifacts(dir.path());
    let sealed = seal(dir.path()).unwrap();
    let verified = verify(dir.path()).unwrap();
    assert_eq!(sealed, verified);
}

#[test]
fn flipping_one_byte_changes_the_bundle_hash_and_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    write_artifacts(dir.path());
    let sealed = seal(dir.path()).unwrap();

    let target = dir.path().join("surface/robustness_surface.json");
    let mut bytes = std::fs::read(&target).unwrap();
    bytes[0] ^= 0x01;
    std::fs::write(&target, &bytes).unwrap();

    assert_ne!(sealed.bundle_sha256, bundle_sha256(dir.path()).unwrap());
    match verify(dir.path()).unwrap_err() {
        IntegrityError::ChecksumMismatch { file, .. } => {
            assert_eq!(file, "surface/robustness_surface.json");
        }
        other => panic!("expected ChecksumMismatch, got {other:?}"),
    }
}

#[test]
fn tampered_stored_bundle_hash_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    write_artifacts(dir.path());
    seal(dir.path()).unwrap();

    // Corrupt only the stored bundle digest, leaving per-file digests
    // intact.
    let path = dir.path().join(CHECKSUMS_FILE);
    let mut manifest: clarity_types::bundle::ChecksumManifest =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    manifest.bundle_sha256 = "0".repeat(64);
    clarity_canon::write_canonical_file(&path, &manifest).unwrap();

    assert!(matches!(
        verify(dir.path()).unwrap_err(),
        IntegrityError::BundleMismatch { .. }
    ));
}

#[test]
fn verification_without_a_seal_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write_artifacts(dir.path());
    assert!(matches!(
        verify(dir.path()).unwrap_err(),
        IntegrityError::MalformedChecksums { .. }
    ));
}
