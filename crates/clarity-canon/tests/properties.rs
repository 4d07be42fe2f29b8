//! Property-based tests for the canonical encoder and quantizer.

use proptest::prelude::*;

use clarity_canon::{
    normalize_newlines, quantize, sha256_hex, sha256_hex_normalized, to_canonical_bytes,
};

fn reasonable_float() -> impl Strategy<Value = f64> {
    -1.0e6..1.0e6f64
}

proptest! {
    /// Quantization is idempotent.
    #[test]
    fn quantize_is_idempotent(value in reasonable_float()) {
        let once = quantize(value).unwrap();
        let twice = quantize(once).unwrap();
        prop_assert_eq!(once.to_bits(), twice.to_bits());
    }

    /// Quantization moves a value by at most half a step.
    #[test]
    fn quantize_error_is_bounded(value in reasonable_float()) {
        let q = quantize(value).unwrap();
        prop_assert!((q - value).abs() <= 5.1e-9 * value.abs().max(1.0));
    }

    /// Quantized output never carries a negative-zero sign.
    #[test]
    fn quantize_never_emits_negative_zero(value in -1.0e-9..1.0e-9f64) {
        let q = quantize(value).unwrap();
        if q == 0.0 {
            prop_assert!(!q.is_sign_negative());
        }
    }

    /// Serializing the same tree twice is byte-identical.
    #[test]
    fn canonical_bytes_are_stable(
        keys in prop::collection::btree_set("[a-z]{1,8}", 1..6),
        raw in prop::collection::vec(reasonable_float(), 6),
    ) {
        let mut map = serde_json::Map::new();
        for (key, value) in keys.iter().zip(raw.iter()) {
            let q = quantize(*value).unwrap();
            map.insert(key.clone(), serde_json::json!(q));
        }
        let tree = serde_json::Value::Object(map);
        let first = to_canonical_bytes(&tree).unwrap();
        let second = to_canonical_bytes(&tree).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Normalization is idempotent on LF-only input and never grows output.
    #[test]
    fn normalization_shrinks_or_preserves(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let once = normalize_newlines(&bytes);
        prop_assert!(once.len() <= bytes.len());
        if !bytes.contains(&b'\r') {
            prop_assert_eq!(&once, &bytes);
        }
    }

    /// Normalized hashing is invariant under CRLF expansion of LF input.
    #[test]
    fn normalized_hash_ignores_crlf(lines in prop::collection::vec("[a-z0-9]{0,12}", 0..8)) {
        let lf = lines.join("\n");
        let crlf = lines.join("\r\n");
        prop_assert_eq!(
            sha256_hex_normalized(lf.as_bytes()),
            sha256_hex_normalized(crlf.as_bytes())
        );
    }

    /// Hex digests are always 64 lowercase hex characters.
    #[test]
    fn digests_are_lowercase_hex(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let digest = sha256_hex(&bytes);
        prop_assert_eq!(digest.len(), 64);
        prop_assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
