//! The deterministic execution scope every backend enters before a call.
//!
//! In the hosted-framework picture this is where a backend would reseed the
//! tensor framework's global and device RNGs, the numeric library's RNG,
//! and the language runtime's RNG, enable deterministic kernel selection,
//! and disable autotuning. This crate has no process-global RNGs to
//! reseed, so the scope carries the equivalent: a seed-derived RNG stream
//! plus idempotent process-wide determinism flags. Entry is idempotent and
//! nothing is restored on exit; the next call re-establishes the scope.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::SeedableRng;
use rand::rngs::StdRng;
use sha2::{Digest, Sha256};

static DETERMINISTIC_KERNELS: AtomicBool = AtomicBool::new(false);
static AUTOTUNING_DISABLED: AtomicBool = AtomicBool::new(false);

/// A scoped acquisition of the seeding discipline.
pub struct DeterministicScope {
    seed: u64,
    rng: StdRng,
}

impl DeterministicScope {
    /// Enter the scope: set the process-wide determinism flags (idempotent)
    /// and derive the per-call RNG stream from the single seed.
    pub fn enter(seed: u64) -> Self {
        if !DETERMINISTIC_KERNELS.swap(true, Ordering::SeqCst) {
            tracing::debug!("deterministic kernel selection enabled");
        }
        if !AUTOTUNING_DISABLED.swap(true, Ordering::SeqCst) {
            tracing::debug!("kernel autotuning disabled");
        }
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The seed-derived RNG stream for backends that draw random state.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Derive a labeled subseed, stable across processes and platforms.
    ///
    /// Backends use this to seed independent subsystems (tokenizer,
    /// vision tower) without consuming from the main stream.
    pub fn derive_subseed(&self, label: &str) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update([0x1f]);
        hasher.update(label.as_bytes());
        let digest = hasher.finalize();
        u64::from_le_bytes(
            digest[..8]
                .try_into()
                .expect("sha256 digest is at least 8 bytes"),
        )
    }

    /// Whether the process-wide determinism flags have been set.
    pub fn deterministic_kernels_enabled() -> bool {
        DETERMINISTIC_KERNELS.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    #[test]
    fn entry_is_idempotent_and_sets_flags() {
        let _a = DeterministicScope::enter(7);
        let _b = DeterministicScope::enter(7);
        assert!(DeterministicScope::deterministic_kernels_enabled());
    }

    #[test]
    fn same_seed_yields_same_stream() {
        let mut a = DeterministicScope::enter(42);
        let mut b = DeterministicScope::enter(42);
        let draws_a: Vec<u32> = (0..4).map(|_| a.rng().r#gen()).collect();
        let draws_b: Vec<u32> = (0..4).map(|_| b.rng().r#gen()).collect();
        assert_eq!(draws_a, draws_b);
    }

    #[test]
    fn subseeds_differ_by_label_but_not_by_call() {
        let scope = DeterministicScope::enter(42);
        assert_eq!(
            scope.derive_subseed("vision"),
            scope.derive_subseed("vision")
        );
        assert_ne!(scope.derive_subseed("vision"), scope.derive_subseed("text"));
    }
}
