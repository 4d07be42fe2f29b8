//! # clarity-adapter
//!
//! **Tier 1 (Backend Contract)**
//!
//! Defines the capability set required of any model backend and the two
//! backends the instrument ships: the stub (deterministic synthetic
//! outputs, no GPU) and the MedGemma reference backend (generic over a
//! runtime supplied by the hosting process).
//!
//! Determinism is the contract, not an aspiration: for identical
//! `(prompt, image_bytes, seed)` a backend must return identical responses,
//! and in rich mode an identical `logits_summary_hash`. The
//! [`DeterministicScope`] seeding discipline is re-established before every
//! call; it is process-global, which is why the orchestrator never runs two
//! inferences concurrently.
//!
//! ## What belongs here
//! * `ModelAdapter` trait and `AdapterError`
//! * Seeding discipline and logit summary hashing
//! * The stub and MedGemma reference backends
//! * The `CLARITY_REAL_MODEL` / `CLARITY_RICH_MODE` environment gates
//!
//! ## What does NOT belong here
//! * Sweep orchestration, artifact layout, metric computation
//! * Physical model weights or a tensor runtime

pub mod context;
pub mod logits;
pub mod medgemma;
pub mod stub;

use thiserror::Error;

use clarity_canon::SerializationError;
use clarity_canon::sha256_hex;
use clarity_types::AdapterResponse;

pub use context::DeterministicScope;
pub use stub::StubAdapter;

/// Environment gate selecting the real (MedGemma) backend.
pub const ENV_REAL_MODEL: &str = "CLARITY_REAL_MODEL";

/// Environment gate forcing rich-signal capture.
pub const ENV_RICH_MODE: &str = "CLARITY_RICH_MODE";

/// Failures a model backend can surface.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("model load failed: {reason}")]
    ModelLoad { reason: String },

    #[error("device out of memory: {reason}")]
    DeviceOom { reason: String },

    #[error("degenerate output for seed {seed}: {reason}")]
    DegenerateOutput { seed: u64, reason: String },

    #[error("seeding discipline violated: logit summaries diverged ({first} != {second})")]
    Seeding { first: String, second: String },

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// The capability set required of any model backend.
///
/// Both entry points must be deterministic functions of
/// `(prompt, image_bytes, seed)`. Implementations re-establish the seeding
/// discipline via [`DeterministicScope::enter`] before touching any model
/// state.
pub trait ModelAdapter {
    /// Stable identifier recorded in manifests (`stub`, `medgemma`).
    fn adapter_id(&self) -> &str;

    /// Deterministic text generation.
    fn generate(&self, prompt: &str, image_bytes: &[u8], seed: u64)
    -> Result<String, AdapterError>;

    /// Deterministic generation with rich signals: token logprobs, entropy,
    /// confidence, token count, logit summary hash, and optionally an
    /// evidence map.
    fn generate_rich(
        &self,
        prompt: &str,
        image_bytes: &[u8],
        seed: u64,
    ) -> Result<AdapterResponse, AdapterError>;

    /// Post-hoc seeding self-check: two rich calls with identical inputs
    /// must agree on their determinism receipt. Returns the receipt.
    ///
    /// The receipt is the `logits_summary_hash` when rich signals are
    /// available and the SHA-256 of the generated text otherwise.
    fn probe_determinism(
        &self,
        prompt: &str,
        image_bytes: &[u8],
        seed: u64,
    ) -> Result<String, AdapterError> {
        let first = determinism_receipt(&self.generate_rich(prompt, image_bytes, seed)?);
        let second = determinism_receipt(&self.generate_rich(prompt, image_bytes, seed)?);
        if first != second {
            return Err(AdapterError::Seeding { first, second });
        }
        Ok(first)
    }
}

fn determinism_receipt(response: &AdapterResponse) -> String {
    match &response.rich {
        Some(rich) => rich.logits_summary_hash.clone(),
        None => sha256_hex(response.text.as_bytes()),
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|value| value.eq_ignore_ascii_case("true"))
}

/// Whether the `CLARITY_REAL_MODEL` gate selects the real backend.
pub fn real_model_enabled() -> bool {
    env_flag(ENV_REAL_MODEL)
}

/// Whether rich signals should be captured for a spec: the spec's own flag
/// or the `CLARITY_RICH_MODE` override.
pub fn rich_mode_enabled(spec_rich_mode: bool) -> bool {
    spec_rich_mode || env_flag(ENV_RICH_MODE)
}

/// Resolve the backend behind the environment gate.
///
/// Without `CLARITY_REAL_MODEL=true` this always returns the stub. With the
/// gate set, the hosting process must supply a [`medgemma::VisionLanguageRuntime`];
/// the gate without a runtime is a model-load failure, not a silent fallback.
pub fn resolve_from_env(
    runtime: Option<Box<dyn medgemma::VisionLanguageRuntime>>,
) -> Result<Box<dyn ModelAdapter>, AdapterError> {
    if !real_model_enabled() {
        return Ok(Box::new(StubAdapter::new()));
    }
    match runtime {
        Some(runtime) => Ok(Box::new(medgemma::MedGemmaAdapter::new(
            medgemma::MedGemmaConfig::default(),
            runtime,
        )?)),
        None => Err(AdapterError::ModelLoad {
            reason: format!("{ENV_REAL_MODEL}=true but no vision-language runtime was supplied"),
        }),
    }
}
