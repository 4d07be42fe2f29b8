//! # clarity-canon
//!
//! **Tier 0 (Determinism Substrate)**
//!
//! One canonical encoder for every artifact the pipeline emits: object keys
//! sorted ascending, compact separators, UTF-8, no trailing whitespace, and
//! every float quantized to 8 decimal places before it enters a structure.
//! File hashing reads raw bytes, applies one CRLF→LF pass, and digests with
//! SHA-256.
//!
//! ## What belongs here
//! * The quantizer and its width constant
//! * Canonical JSON value/byte/file emission and the JSONL writer
//! * Newline normalization and SHA-256 hex digests
//! * Deterministic mean/variance helpers shared by the metric engines
//!
//! ## What does NOT belong here
//! * Artifact schemas (clarity-types)
//! * Anything that consults a clock, an RNG, or the environment

pub mod stats;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Decimal places every emitted float is rounded to.
pub const QUANT_DECIMALS: u32 = 8;

const QUANT_FACTOR: f64 = 1e8;

/// Failures of the canonical encoder.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("non-finite float {value} cannot be quantized")]
    NonFinite { value: f64 },

    #[error("null at {path} is not canonical (non-finite floats serialize as null)")]
    NullValue { path: String },

    #[error("float {value} at {path} is not quantized to {QUANT_DECIMALS} decimals")]
    Unquantized { path: String, value: f64 },

    #[error("map key at {path} is not a string")]
    InvalidKey { path: String },

    #[error("canonical encoding failed: {message}")]
    Encode { message: String },

    #[error("io failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Round a float to 8 decimal places, half away from zero.
///
/// Negative zero collapses to positive zero so no artifact ever prints
/// `-0.0`. Values too large to carry any fractional resolution pass through
/// unchanged. Non-finite input is a `SerializationError`, never a silent
/// null.
pub fn quantize(value: f64) -> Result<f64, SerializationError> {
    if !value.is_finite() {
        return Err(SerializationError::NonFinite { value });
    }
    let scaled = value * QUANT_FACTOR;
    if !scaled.is_finite() {
        return Ok(value);
    }
    let rounded = scaled.round() / QUANT_FACTOR;
    Ok(if rounded == 0.0 { 0.0 } else { rounded })
}

/// Quantize every element of a slice.
pub fn quantize_all(values: &[f64]) -> Result<Vec<f64>, SerializationError> {
    values.iter().copied().map(quantize).collect()
}

/// Serialize to a `serde_json::Value` and verify it is canonical.
///
/// The backing map is a `BTreeMap`, so object keys come out sorted; the
/// check walks the tree rejecting nulls (the silent image of a non-finite
/// float), unquantized floats, and negative zero.
pub fn to_canonical_value<T: Serialize>(value: &T) -> Result<Value, SerializationError> {
    let tree = serde_json::to_value(value).map_err(|err| classify_encode_error(&err))?;
    check_canonical(&tree, "$")?;
    Ok(tree)
}

/// Canonical bytes: sorted keys, compact separators, no trailing newline.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let tree = to_canonical_value(value)?;
    serde_json::to_vec(&tree).map_err(|err| SerializationError::Encode {
        message: err.to_string(),
    })
}

/// Canonical bytes as a `String`.
pub fn to_canonical_string<T: Serialize>(value: &T) -> Result<String, SerializationError> {
    let bytes = to_canonical_bytes(value)?;
    String::from_utf8(bytes).map_err(|err| SerializationError::Encode {
        message: err.to_string(),
    })
}

/// Write one canonical JSON document. The parent directory must exist.
pub fn write_canonical_file<T: Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), SerializationError> {
    let bytes = to_canonical_bytes(value)?;
    std::fs::write(path, bytes).map_err(|source| SerializationError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write records as JSONL: one canonical document per line, LF terminated.
pub fn write_jsonl_file<T: Serialize>(
    path: &Path,
    records: &[T],
) -> Result<(), SerializationError> {
    let mut out = Vec::new();
    for record in records {
        out.extend_from_slice(&to_canonical_bytes(record)?);
        out.push(b'\n');
    }
    std::fs::write(path, out).map_err(|source| SerializationError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// One CRLF→LF pass. Lone carriage returns are left alone.
pub fn normalize_newlines(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

/// Lowercase-hex SHA-256 of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex_lower(&Sha256::digest(bytes))
}

/// SHA-256 after newline normalization; the digest every checksum uses.
pub fn sha256_hex_normalized(bytes: &[u8]) -> String {
    sha256_hex(&normalize_newlines(bytes))
}

/// Hash a file's bytes after one CRLF→LF pass.
pub fn hash_file_normalized(path: &Path) -> Result<String, SerializationError> {
    let data = std::fs::read(path).map_err(|source| SerializationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(sha256_hex_normalized(&data))
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(&mut out, "{b:02x}").expect("writing to String should not fail");
    }
    out
}

fn classify_encode_error(err: &serde_json::Error) -> SerializationError {
    let message = err.to_string();
    if message.contains("key must be a string") {
        SerializationError::InvalidKey {
            path: "$".to_string(),
        }
    } else {
        SerializationError::Encode { message }
    }
}

fn check_canonical(value: &Value, path: &str) -> Result<(), SerializationError> {
    match value {
        Value::Null => Err(SerializationError::NullValue {
            path: path.to_string(),
        }),
        Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(number) => {
            if number.is_f64() {
                let float = number.as_f64().unwrap_or(f64::NAN);
                let quantized = quantize(float)?;
                let is_negative_zero = float == 0.0 && float.is_sign_negative();
                if quantized != float || is_negative_zero {
                    return Err(SerializationError::Unquantized {
                        path: path.to_string(),
                        value: float,
                    });
                }
            }
            Ok(())
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                check_canonical(item, &format!("{path}[{index}]"))?;
            }
            Ok(())
        }
        Value::Object(map) => {
            for (key, item) in map {
                check_canonical(item, &format!("{path}.{key}"))?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_rounds_repeating_fractions() {
        assert_eq!(quantize(1.0 / 3.0).unwrap(), 0.33333333);
        assert_eq!(quantize(2.0 / 3.0).unwrap(), 0.66666667);
        assert_eq!(quantize(-2.0 / 3.0).unwrap(), -0.66666667);
    }

    #[test]
    fn quantize_collapses_negative_zero() {
        let q = quantize(-0.0).unwrap();
        assert_eq!(q, 0.0);
        assert!(!q.is_sign_negative());
    }

    #[test]
    fn quantize_rejects_non_finite() {
        assert!(quantize(f64::NAN).is_err());
        assert!(quantize(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn canonical_bytes_sort_keys_and_stay_compact() {
        #[derive(serde::Serialize)]
        struct Sample {
            zulu: u32,
            alpha: u32,
        }
        let bytes = to_canonical_bytes(&Sample { zulu: 1, alpha: 2 }).unwrap();
        assert_eq!(bytes, b"{\"alpha\":2,\"zulu\":1}");
    }

    #[test]
    fn unquantized_floats_are_rejected() {
        let err = to_canonical_bytes(&serde_json::json!({"x": 0.123456789})).unwrap_err();
        assert!(matches!(err, SerializationError::Unquantized { .. }));
    }

    #[test]
    fn nan_surfaces_as_null_rejection() {
        let err = to_canonical_bytes(&serde_json::json!({"x": f64::NAN})).unwrap_err();
        assert!(matches!(err, SerializationError::NullValue { .. }));
    }
}
