//! Logit post-processing shared by every backend: softmax, entropy, and
//! the fixed logit summary whose SHA-256 is the per-inference determinism
//! receipt.

use serde::Serialize;

use clarity_canon::{quantize, sha256_hex, to_canonical_bytes};

use crate::AdapterError;

/// How many top logit values per step enter the summary.
pub const SUMMARY_TOP_K: usize = 3;

/// Numerically stable softmax over one logit row.
pub fn softmax(row: &[f64]) -> Vec<f64> {
    if row.is_empty() {
        return Vec::new();
    }
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = row.iter().map(|v| (v - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.iter().map(|v| v / total).collect()
}

/// Shannon entropy in nats of one probability row; `0 ln 0` is zero.
pub fn entropy(probs: &[f64]) -> f64 {
    -probs
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| p * p.ln())
        .sum::<f64>()
}

/// Index of the largest value; first occurrence wins ties so greedy
/// decoding is deterministic.
pub fn argmax(row: &[f64]) -> usize {
    let mut best = 0;
    for (idx, value) in row.iter().enumerate() {
        if *value > row[best] {
            best = idx;
        }
    }
    best
}

/// The fixed summary of an output logit distribution.
///
/// Per decoding step: the argmax index and the top-K logit values,
/// quantized. Two runs under intact seeding discipline produce identical
/// summaries; the hash of this structure is the receipt the sweep records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogitSummary {
    pub steps: u64,
    pub vocab: u64,
    pub argmax_indices: Vec<u64>,
    pub top_values: Vec<Vec<f64>>,
}

/// Build the fixed summary from per-step logit rows.
pub fn summarize(rows: &[Vec<f64>]) -> Result<LogitSummary, AdapterError> {
    let vocab = rows.first().map_or(0, Vec::len) as u64;
    let mut argmax_indices = Vec::with_capacity(rows.len());
    let mut top_values = Vec::with_capacity(rows.len());
    for row in rows {
        argmax_indices.push(argmax(row) as u64);
        let mut sorted = row.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        sorted.truncate(SUMMARY_TOP_K);
        let quantized: Result<Vec<f64>, _> = sorted.into_iter().map(quantize).collect();
        top_values.push(quantized?);
    }
    Ok(LogitSummary {
        steps: rows.len() as u64,
        vocab,
        argmax_indices,
        top_values,
    })
}

/// SHA-256 over the canonical encoding of the fixed summary.
pub fn summary_hash(rows: &[Vec<f64>]) -> Result<String, AdapterError> {
    let summary = summarize(rows)?;
    let bytes = to_canonical_bytes(&summary)?;
    Ok(sha256_hex(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let total: f64 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn entropy_of_certainty_is_zero() {
        assert_eq!(entropy(&[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn entropy_is_maximal_for_uniform() {
        let uniform = entropy(&[0.25; 4]);
        let skewed = entropy(&[0.7, 0.1, 0.1, 0.1]);
        assert!(uniform > skewed);
        assert!((uniform - 4.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn argmax_breaks_ties_toward_first() {
        assert_eq!(argmax(&[0.5, 0.5, 0.1]), 0);
        assert_eq!(argmax(&[0.1, 0.9, 0.9]), 1);
    }

    #[test]
    fn summary_hash_is_stable_and_input_sensitive() {
        let rows = vec![vec![0.5, 1.5, -0.25], vec![2.0, 0.0, 1.0]];
        let a = summary_hash(&rows).unwrap();
        let b = summary_hash(&rows).unwrap();
        assert_eq!(a, b);

        let mut perturbed = rows.clone();
        perturbed[1][0] = 1.875;
        assert_ne!(a, summary_hash(&perturbed).unwrap());
    }

    #[test]
    fn summary_keeps_only_top_k() {
        let summary = summarize(&[vec![5.0, 1.0, 4.0, 3.0, 2.0]]).unwrap();
        assert_eq!(summary.top_values[0], vec![5.0, 4.0, 3.0]);
        assert_eq!(summary.argmax_indices, vec![0]);
        assert_eq!(summary.vocab, 5);
    }
}
