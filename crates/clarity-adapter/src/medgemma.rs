//! The MedGemma reference backend.
//!
//! Everything about the inference discipline lives here: the chat template
//! with its image placeholder token, bfloat16 enforcement, greedy decoding,
//! the fixed new-token budget, rich-signal extraction, and degenerate-output
//! detection. The forward pass itself is behind [`VisionLanguageRuntime`],
//! supplied by the hosting process, so the physical weights never enter
//! this crate.

use clarity_canon::quantize;
use clarity_types::overlay::EvidenceMap;
use clarity_types::{AdapterResponse, RichSignals};

use crate::context::DeterministicScope;
use crate::logits;
use crate::{AdapterError, ModelAdapter};

/// HAI-DEF model identifier of the reference backend.
pub const MEDGEMMA_MODEL_ID: &str = "google/medgemma-4b-it";

/// Placeholder token the chat template inserts for the image.
pub const IMAGE_PLACEHOLDER_TOKEN: &str = "<start_of_image>";

/// Fixed decoding budget; greedy, no sampling.
pub const MAX_NEW_TOKENS: usize = 256;

/// Transient device budget the reference backend is sized for.
pub const DEVICE_MEMORY_BUDGET_BYTES: u64 = 12 * 1024 * 1024 * 1024;

/// Numeric precision of the forward pass.
///
/// `Float16` exists only to be rejected: it overflows to NaN in
/// image-conditioned forward passes for this model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Bfloat16,
    Float16,
    Float32,
}

impl Precision {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bfloat16 => "bfloat16",
            Self::Float16 => "float16",
            Self::Float32 => "float32",
        }
    }
}

/// Reference backend configuration.
#[derive(Debug, Clone)]
pub struct MedGemmaConfig {
    pub model_id: String,
    pub precision: Precision,
    pub max_new_tokens: usize,
}

impl Default for MedGemmaConfig {
    fn default() -> Self {
        Self {
            model_id: MEDGEMMA_MODEL_ID.to_string(),
            precision: Precision::Bfloat16,
            max_new_tokens: MAX_NEW_TOKENS,
        }
    }
}

impl MedGemmaConfig {
    pub fn validate(&self) -> Result<(), AdapterError> {
        if self.precision == Precision::Float16 {
            return Err(AdapterError::ModelLoad {
                reason: format!(
                    "{} does not support float16: image-conditioned forward passes overflow to NaN; use bfloat16",
                    self.model_id
                ),
            });
        }
        if self.max_new_tokens == 0 {
            return Err(AdapterError::ModelLoad {
                reason: "max_new_tokens must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Render the model's chat template around the user prompt.
///
/// The image placeholder token stands where the vision tower splices in
/// image soft tokens; the trailing model turn cues generation.
pub fn render_chat_prompt(prompt: &str) -> String {
    format!(
        "<start_of_turn>user\n{IMAGE_PLACEHOLDER_TOKEN}\n{prompt}<end_of_turn>\n<start_of_turn>model\n"
    )
}

/// One forward request as the runtime sees it.
#[derive(Debug)]
pub struct RuntimeRequest<'a> {
    pub rendered_prompt: String,
    pub image_bytes: &'a [u8],
    pub seed: u64,
    pub max_new_tokens: usize,
    /// Always true for this instrument; carried so a runtime can assert it.
    pub greedy: bool,
}

/// One decoding step: the emitted token text and the full logit row it was
/// chosen from.
#[derive(Debug, Clone)]
pub struct RuntimeStep {
    pub token: String,
    pub logits: Vec<f64>,
}

/// A completed forward pass.
#[derive(Debug, Clone)]
pub struct RuntimeOutput {
    pub steps: Vec<RuntimeStep>,
    /// Spatial attention proxy over the image, row-major, any rectangular
    /// size.
    pub attention: Option<Vec<Vec<f64>>>,
}

/// The forward-pass seam. Implementations must be deterministic functions
/// of the request, including its seed.
pub trait VisionLanguageRuntime {
    fn runtime_id(&self) -> &str;

    fn forward(&self, request: &RuntimeRequest<'_>) -> Result<RuntimeOutput, AdapterError>;
}

/// The reference adapter: template + discipline around any runtime.
pub struct MedGemmaAdapter {
    config: MedGemmaConfig,
    runtime: Box<dyn VisionLanguageRuntime>,
}

impl std::fmt::Debug for MedGemmaAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MedGemmaAdapter")
            .field("config", &self.config)
            .field("runtime", &self.runtime.runtime_id())
            .finish()
    }
}

impl MedGemmaAdapter {
    pub fn new(
        config: MedGemmaConfig,
        runtime: Box<dyn VisionLanguageRuntime>,
    ) -> Result<Self, AdapterError> {
        config.validate()?;
        tracing::debug!(
            model_id = %config.model_id,
            precision = config.precision.as_str(),
            runtime = runtime.runtime_id(),
            "medgemma adapter ready"
        );
        Ok(Self { config, runtime })
    }

    pub fn config(&self) -> &MedGemmaConfig {
        &self.config
    }

    fn forward(
        &self,
        prompt: &str,
        image_bytes: &[u8],
        seed: u64,
    ) -> Result<RuntimeOutput, AdapterError> {
        let _scope = DeterministicScope::enter(seed);
        let request = RuntimeRequest {
            rendered_prompt: render_chat_prompt(prompt),
            image_bytes,
            seed,
            max_new_tokens: self.config.max_new_tokens,
            greedy: true,
        };
        let output = self.runtime.forward(&request)?;
        if output.steps.is_empty() {
            return Err(AdapterError::DegenerateOutput {
                seed,
                reason: "runtime produced zero decoding steps".to_string(),
            });
        }
        if output.steps.len() > self.config.max_new_tokens {
            return Err(AdapterError::DegenerateOutput {
                seed,
                reason: format!(
                    "runtime produced {} steps, budget is {}",
                    output.steps.len(),
                    self.config.max_new_tokens
                ),
            });
        }
        Ok(output)
    }

    fn detokenize(steps: &[RuntimeStep]) -> String {
        steps.iter().map(|step| step.token.as_str()).collect()
    }
}

impl ModelAdapter for MedGemmaAdapter {
    fn adapter_id(&self) -> &str {
        "medgemma"
    }

    fn generate(&self, prompt: &str, image_bytes: &[u8], seed: u64) -> Result<String, AdapterError> {
        let output = self.forward(prompt, image_bytes, seed)?;
        let text = Self::detokenize(&output.steps);
        if text.trim().is_empty() {
            return Err(AdapterError::DegenerateOutput {
                seed,
                reason: "generated text is empty".to_string(),
            });
        }
        Ok(text)
    }

    fn generate_rich(
        &self,
        prompt: &str,
        image_bytes: &[u8],
        seed: u64,
    ) -> Result<AdapterResponse, AdapterError> {
        let output = self.forward(prompt, image_bytes, seed)?;
        let text = Self::detokenize(&output.steps);

        let rows: Vec<Vec<f64>> = output.steps.iter().map(|step| step.logits.clone()).collect();
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

        let confidence = quantize(max_probs.iter().sum::<f64>() / max_probs.len() as f64)?;
        if text.trim().is_empty() && confidence == 0.0 {
            return Err(AdapterError::DegenerateOutput {
                seed,
                reason: "empty text with zero confidence".to_string(),
            });
        }

        let evidence_map = match output.attention {
            Some(grid) => Some(quantized_evidence(grid)?),
            None => None,
        };

        Ok(AdapterResponse {
            text,
            rich: Some(RichSignals {
                mean_logprob: quantize(
                    token_logprobs.iter().sum::<f64>() / token_logprobs.len() as f64,
                )?,
                output_entropy: quantize(entropies.iter().sum::<f64>() / entropies.len() as f64)?,
                confidence,
                token_count: rows.len() as u64,
                token_logprobs,
                logits_summary_hash: logits::summary_hash(&rows)?,
                evidence_map,
            }),
        })
    }
}

fn quantized_evidence(grid: Vec<Vec<f64>>) -> Result<EvidenceMap, AdapterError> {
    let mut rows = Vec::with_capacity(grid.len());
    for row in grid {
        let quantized: Result<Vec<f64>, _> = row.into_iter().map(quantize).collect();
        rows.push(quantized?);
    }
    Ok(EvidenceMap::from_rows(rows))
}

/// A deterministic in-memory runtime for exercising the reference adapter
/// without weights or a GPU.
///
/// Token choice and logits are derived from a SHA-256 of the full request,
/// image bytes included, so unlike the stub backend this path *does* react
/// to perturbations.
#[derive(Debug, Clone, Default)]
pub struct SyntheticRuntime;

impl SyntheticRuntime {
    pub fn new() -> Self {
        Self
    }
}

/// Token pieces the synthetic runtime assembles answers from.
const SYNTHETIC_ANSWERS: [&str; 4] = [
    "no acute abnormality",
    "opacity in the left base",
    "enlarged cardiac silhouette",
    "small right effusion",
];

const SYNTHETIC_JUSTIFICATIONS: [&str; 4] = [
    "costophrenic angles are sharp",
    "airspace shadowing obscures the hemidiaphragm",
    "cardiothoracic ratio exceeds one half",
    "the posterior sulcus is blunted",
];

impl VisionLanguageRuntime for SyntheticRuntime {
    fn runtime_id(&self) -> &str {
        "synthetic"
    }

    fn forward(&self, request: &RuntimeRequest<'_>) -> Result<RuntimeOutput, AdapterError> {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(request.rendered_prompt.as_bytes());
        hasher.update([0x1f]);
        hasher.update(request.image_bytes);
        hasher.update(request.seed.to_le_bytes());
        let digest: [u8; 32] = hasher.finalize().into();

        let answer = SYNTHETIC_ANSWERS[(digest[0] as usize) % SYNTHETIC_ANSWERS.len()];
        let justification =
            SYNTHETIC_JUSTIFICATIONS[(digest[1] as usize) % SYNTHETIC_JUSTIFICATIONS.len()];
        let text = format!("{answer}\n{justification}");

        // One step per whitespace-delimited piece, newline carried inline.
        let mut pieces = Vec::new();
        for (index, word) in text.split(' ').enumerate() {
            if index == 0 {
                pieces.push(word.to_string());
            } else {
                pieces.push(format!(" {word}"));
            }
        }

        let steps = pieces
            .into_iter()
            .enumerate()
            .map(|(index, token)| {
                let mut step_hasher = Sha256::new();
                step_hasher.update(digest);
                step_hasher.update((index as u32).to_le_bytes());
                let block = step_hasher.finalize();
                let logits: Vec<f64> = block[..12]
                    .iter()
                    .map(|byte| f64::from(*byte) / 32.0 - 4.0)
                    .collect();
                RuntimeStep { token, logits }
            })
            .collect();

        let attention = (0..8)
            .map(|y| {
                (0..8)
                    .map(|x| {
                        let byte = digest[(y * 8 + x) % 32];
                        f64::from(byte) / 256.0
                    })
                    .collect()
            })
            .collect();

        Ok(RuntimeOutput {
            steps,
            attention: Some(attention),
        })
    }
}
