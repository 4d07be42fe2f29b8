//! # clarity-types
//!
//! **Tier 0 (Core Types)**
//!
//! This crate defines the core data structures and contracts for the CLARITY
//! robustness evaluation pipeline. It contains only data types and Serde
//! definitions.
//!
//! ## Stability Policy
//!
//! **JSON-first stability**: the primary contract is the JSON schema of the
//! sealed artifact bundle, not Rust struct literals. Every artifact-bound
//! struct here serializes through the canonical encoder in `clarity-canon`,
//! so field sets are part of the bundle-hash recipe. Adding a field changes
//! every downstream `bundle_sha256`; treat that as a breaking change.
//!
//! ## What belongs here
//! * Pure data structs (specs, manifests, responses, surfaces, probes)
//! * Serialization/Deserialization definitions
//! * The directory-safe axis value encoding
//!
//! ## What does NOT belong here
//! * File I/O
//! * Engine logic (metrics, surfaces, masking)
//! * Hashing or canonical encoding (use clarity-canon)

pub mod bundle;
pub mod overlay;
pub mod probe;
pub mod surface;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::overlay::EvidenceMap;

/// Axis name and run key reserved for the unperturbed baseline run.
///
/// The baseline is always `runs[0]` in canonical execution order and lives
/// in the `baseline/` directory of the sweep root. It is never searched for
/// by content.
pub const BASELINE_AXIS: &str = "baseline";

/// The four perturbation axes the instrument degrades images along.
///
/// Canonical axis order is alphabetical on the lowercase name:
/// `blur`, `brightness`, `contrast`, `occlusion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerturbationKind {
    Blur,
    Brightness,
    Contrast,
    Occlusion,
}

impl PerturbationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blur => "blur",
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Occlusion => "occlusion",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "blur" => Some(Self::Blur),
            "brightness" => Some(Self::Brightness),
            "contrast" => Some(Self::Contrast),
            "occlusion" => Some(Self::Occlusion),
            _ => None,
        }
    }
}

/// All perturbation kinds in canonical (alphabetical) order.
pub const PERTURBATION_KINDS: [PerturbationKind; 4] = [
    PerturbationKind::Blur,
    PerturbationKind::Brightness,
    PerturbationKind::Contrast,
    PerturbationKind::Occlusion,
];

impl PerturbationKind {
    pub const fn all() -> &'static [PerturbationKind; 4] {
        &PERTURBATION_KINDS
    }
}

/// Rejected inputs to the directory-safe value encoding.
#[derive(Debug, Error, PartialEq)]
pub enum AxisValueError {
    #[error("axis value {0} is not finite")]
    NonFinite(f64),
}

/// Encode an axis value as a directory-safe string.
///
/// `1.0` becomes `1p0`, `0.8` becomes `0p8`, `-0.5` becomes `m0p5`. Whole
/// values always keep one fractional digit so the encoding is unambiguous
/// about being a float. The encoding is the identity under which values are
/// sorted lexicographically in surface artifacts.
pub fn encode_axis_value(value: f64) -> Result<String, AxisValueError> {
    if !value.is_finite() {
        return Err(AxisValueError::NonFinite(value));
    }
    let rendered = if value == value.trunc() {
        format!("{value:.1}")
    } else {
        format!("{value}")
    };
    Ok(rendered.replace('-', "m").replace('.', "p"))
}

/// One perturbation axis: a kind plus its declared value list.
///
/// Declared value order is preserved in the manifest and in sweep execution;
/// only surface artifacts re-sort values (lexicographically on the encoded
/// string).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationAxis {
    pub kind: PerturbationKind,
    pub values: Vec<f64>,
}

impl PerturbationAxis {
    pub fn new(kind: PerturbationKind, values: Vec<f64>) -> Self {
        Self { kind, values }
    }
}

/// The caller-constructed description of one sweep.
///
/// Consumed once by the orchestrator, never mutated. `timestamp` is an
/// opaque caller-supplied string; the core never reads a clock, so two
/// executions with the same spec produce byte-identical artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSpec {
    pub run_id: String,
    pub timestamp: String,
    pub prompt: String,
    pub image_bytes: Vec<u8>,
    pub axes: Vec<PerturbationAxis>,
    pub seeds: Vec<u64>,
    pub adapter_id: String,
    pub rich_mode: bool,
}

/// Descriptor of a single executed run inside the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// `baseline` or `<axis>/<value>/<seed>`.
    pub run_key: String,
    pub axis: String,
    pub value: String,
    pub seed: u64,
    /// Paths relative to the sweep root.
    pub image_path: String,
    pub response_path: String,
    pub trace_path: String,
}

/// The sweep manifest, written last, entry point for every consumer.
///
/// `runs` is in canonical execution order: the baseline run first, then axes
/// alphabetical, values in declared order, seeds in declared order.
/// `baseline_run` always equals `runs[0].run_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepManifest {
    pub run_id: String,
    pub timestamp: String,
    pub seeds: Vec<u64>,
    /// Perturbation axis names, alphabetical. Does not include `baseline`.
    pub axes: Vec<String>,
    /// Encoded values per axis, in declared order.
    pub values: BTreeMap<String, Vec<String>>,
    pub runs: Vec<RunRecord>,
    pub baseline_run: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter_metadata: Option<serde_json::Value>,
}

/// One JSONL record of a `trace_pack.jsonl`.
///
/// Every record carries `step_id`; the final record additionally carries the
/// extracted `output` (answer) and `justification`. Consumers tolerate
/// foreign trace packs that use `step` / `answer` instead (see
/// [`ExtractedAnswer`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub step_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprob: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter_metadata: Option<serde_json::Value>,
}

impl TraceRecord {
    /// A bare decoding-step record.
    pub fn step(step_id: u64) -> Self {
        Self {
            step_id,
            logprob: None,
            output: None,
            justification: None,
            adapter_metadata: None,
        }
    }
}

/// Rich per-inference signals, present when the adapter ran in rich mode.
///
/// All floats are pre-quantized to 8 decimal places by the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichSignals {
    pub mean_logprob: f64,
    pub output_entropy: f64,
    pub confidence: f64,
    pub token_count: u64,
    pub token_logprobs: Vec<f64>,
    /// SHA-256 over a fixed summary of the output logit distribution; the
    /// per-inference determinism receipt.
    pub logits_summary_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_map: Option<EvidenceMap>,
}

/// What a model backend returns for one inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rich: Option<RichSignals>,
}

impl AdapterResponse {
    /// Split the generated text into `(answer, justification)`.
    ///
    /// The first line is the answer; the remaining lines, joined by `\n`,
    /// are the justification. The split is deterministic and total: text
    /// without a newline yields an empty justification.
    pub fn split_text(&self) -> (String, String) {
        match self.text.split_once('\n') {
            Some((answer, rest)) => (answer.trim().to_string(), rest.trim().to_string()),
            None => (self.text.trim().to_string(), String::new()),
        }
    }
}

/// Outcome of reading the answer off the last trace-pack record.
///
/// The observed schema variants form a sum type: modern packs carry
/// `output`, older packs carry `answer`, and anything else is `Missing`.
/// `Missing` on the metrics path is an error; it is never silently scored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedAnswer {
    FromOutput(String),
    FromAnswer(String),
    Missing,
}

impl ExtractedAnswer {
    /// Read the answer from a decoded trace record, preferring `output`.
    ///
    /// Empty strings and non-string values do not count as answers.
    pub fn from_record(record: &serde_json::Value) -> Self {
        match record.get("output").and_then(serde_json::Value::as_str) {
            Some(text) if !text.is_empty() => return Self::FromOutput(text.to_string()),
            _ => {}
        }
        match record.get("answer").and_then(serde_json::Value::as_str) {
            Some(text) if !text.is_empty() => Self::FromAnswer(text.to_string()),
            _ => Self::Missing,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::FromOutput(text) | Self::FromAnswer(text) => Some(text),
            Self::Missing => None,
        }
    }
}

/// Read the justification off a decoded trace record.
///
/// A string is taken verbatim, a non-string value is coerced through its
/// JSON rendering, and an absent field is the empty string. This path never
/// fails: a missing justification means "no justification", not an error.
pub fn extract_justification(record: &serde_json::Value) -> String {
    match record.get("justification") {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_value_encoding_matches_directory_scheme() {
        assert_eq!(encode_axis_value(1.0).unwrap(), "1p0");
        assert_eq!(encode_axis_value(0.8).unwrap(), "0p8");
        assert_eq!(encode_axis_value(1.25).unwrap(), "1p25");
        assert_eq!(encode_axis_value(-0.5).unwrap(), "m0p5");
        assert_eq!(encode_axis_value(2.0).unwrap(), "2p0");
        assert_eq!(encode_axis_value(0.0).unwrap(), "0p0");
    }

    #[test]
    fn axis_value_encoding_rejects_non_finite() {
        assert!(encode_axis_value(f64::NAN).is_err());
        assert!(encode_axis_value(f64::INFINITY).is_err());
    }

    #[test]
    fn perturbation_kinds_are_alphabetical() {
        let names: Vec<&str> = PERTURBATION_KINDS.iter().map(|k| k.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn split_text_takes_first_line_as_answer() {
        let response = AdapterResponse {
            text: "no acute findings\nlungs are clear bilaterally".into(),
            rich: None,
        };
        let (answer, justification) = response.split_text();
        assert_eq!(answer, "no acute findings");
        assert_eq!(justification, "lungs are clear bilaterally");
    }

    #[test]
    fn extracted_answer_prefers_output_over_answer() {
        let record = serde_json::json!({"step_id": 3, "output": "a", "answer": "b"});
        assert_eq!(
            ExtractedAnswer::from_record(&record),
            ExtractedAnswer::FromOutput("a".into())
        );
        let record = serde_json::json!({"step_id": 3, "output": "", "answer": "b"});
        assert_eq!(
            ExtractedAnswer::from_record(&record),
            ExtractedAnswer::FromAnswer("b".into())
        );
        let record = serde_json::json!({"step_id": 3});
        assert_eq!(ExtractedAnswer::from_record(&record), ExtractedAnswer::Missing);
    }
}
