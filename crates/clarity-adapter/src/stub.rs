//! The stubbed backend: deterministic synthetic outputs so the pipeline is
//! testable without model weights or a GPU.
//!
//! Text selection depends only on `(prompt, seed)`; the image bytes are
//! deliberately ignored. That makes the stub the canonical "counterfactual
//! irrelevance" backend: masking any region leaves every metric unchanged.

use sha2::{Digest, Sha256};

use clarity_canon::quantize;
use clarity_types::overlay::EvidenceMap;
use clarity_types::{AdapterResponse, RichSignals};

use crate::context::DeterministicScope;
use crate::logits;
use crate::{AdapterError, ModelAdapter};

/// Vocabulary width of the synthesized logit rows.
const STUB_VOCAB: usize = 16;

/// Side length of the fixed evidence map.
const EVIDENCE_SIDE: usize = 16;

/// Answer/justification pairs the digest selects from.
const STUB_FINDINGS: [(&str, &str); 6] = [
    (
        "no acute findings",
        "lungs are clear bilaterally with no focal consolidation",
    ),
    (
        "possible opacity",
        "hazy opacity projects over the left lower lobe",
    ),
    (
        "cardiomegaly",
        "cardiac silhouette is enlarged beyond half the thoracic width",
    ),
    (
        "pleural effusion",
        "blunting of the right costophrenic angle suggests fluid",
    ),
    (
        "pneumothorax",
        "a thin visceral pleural line parallels the apical chest wall",
    ),
    (
        "interstitial pattern",
        "diffuse reticular markings are present in both bases",
    ),
];

/// Fixed Gaussian bump centers `(cx, cy, sigma, amplitude)` in normalized
/// coordinates; the evidence map is identical for every input.
const EVIDENCE_BUMPS: [(f64, f64, f64, f64); 3] = [
    (0.30, 0.35, 0.08, 1.00),
    (0.70, 0.60, 0.12, 0.85),
    (0.45, 0.75, 0.10, 0.60),
];

/// The weights-free backend.
#[derive(Debug, Clone, Default)]
pub struct StubAdapter;

impl StubAdapter {
    pub fn new() -> Self {
        Self
    }

    fn digest(prompt: &str, seed: u64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(prompt.as_bytes());
        hasher.update([0x1f]);
        hasher.update(seed.to_le_bytes());
        hasher.finalize().into()
    }

    /// Counter-mode expansion of the digest into one logit row per step.
    ///
    /// Bytes map onto exact multiples of 1/16 so every derived float is
    /// already quantized.
    fn logit_rows(digest: &[u8; 32]) -> Vec<Vec<f64>> {
        let steps = 6 + (digest[1] as usize) % 6;
        let mut rows = Vec::with_capacity(steps);
        for step in 0..steps {
            let mut hasher = Sha256::new();
            hasher.update(digest);
            hasher.update((step as u32).to_le_bytes());
            let block = hasher.finalize();
            let row: Vec<f64> = block[..STUB_VOCAB]
                .iter()
                .map(|byte| f64::from(*byte) / 16.0 - 8.0)
                .collect();
            rows.push(row);
        }
        rows
    }

    fn text_for(digest: &[u8; 32]) -> String {
        let (answer, justification) = STUB_FINDINGS[(digest[0] as usize) % STUB_FINDINGS.len()];
        format!("{answer}\n{justification}")
    }
}

/// The canonical evidence map: two or three analytic Gaussian bumps at
/// fixed centers and widths, sampled at cell centers, quantized.
pub fn synthetic_evidence_map() -> Result<EvidenceMap, AdapterError> {
    let side = EVIDENCE_SIDE;
    let mut rows = Vec::with_capacity(side);
    for y in 0..side {
        let cy = (y as f64 + 0.5) / side as f64;
        let mut row = Vec::with_capacity(side);
        for x in 0..side {
            let cx = (x as f64 + 0.5) / side as f64;
            let mut value = 0.0;
            for (bx, by, sigma, amplitude) in EVIDENCE_BUMPS {
                let dx = cx - bx;
                let dy = cy - by;
                value += amplitude * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
            }
            row.push(quantize(value)?);
        }
        rows.push(row);
    }
    Ok(EvidenceMap::from_rows(rows))
}

impl ModelAdapter for StubAdapter {
    fn adapter_id(&self) -> &str {
        "stub"
    }

    fn generate(&self, prompt: &str, _image_bytes: &[u8], seed: u64) -> Result<String, AdapterError> {
        let _scope = DeterministicScope::enter(seed);
        Ok(Self::text_for(&Self::digest(prompt, seed)))
    }

    fn generate_rich(
        &self,
        prompt: &str,
        _image_bytes: &[u8],
        seed: u64,
    ) -> Result<AdapterResponse, AdapterError> {
        let _scope = DeterministicScope::enter(seed);
        let digest = Self::digest(prompt, seed);
        let text = Self::text_for(&digest);

        let rows = Self::logit_rows(&digest);
        let mut token_logprobs = Vec::with_capacity(rows.len());
        let mut entropies = Vec::with_capacity(rows.len());
        let mut max_probs = Vec::with_capacity(rows.len());
        for row in &rows {
            let probs = logits::softmax(row);
            let chosen = logits::argmax(row);
            token_logprobs.push(quantize(probs[chosen].ln())?);
            entropies.push(logits::entropy(&probs));
            max_probs.push(probs[chosen]);
        }

        let mean_logprob =
            quantize(token_logprobs.iter().sum::<f64>() / token_logprobs.len() as f64)?;
        let output_entropy = quantize(entropies.iter().sum::<f64>() / entropies.len() as f64)?;
        let confidence = quantize(max_probs.iter().sum::<f64>() / max_probs.len() as f64)?;

        Ok(AdapterResponse {
            text,
            rich: Some(RichSignals {
                mean_logprob,
                output_entropy,
                confidence,
                token_count: rows.len() as u64,
                token_logprobs,
                logits_summary_hash: logits::summary_hash(&rows)?,
                evidence_map: Some(synthetic_evidence_map()?),
            }),
        })
    }
}
