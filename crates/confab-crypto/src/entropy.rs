//! Random source abstraction.
//!
//! Decouples key and IV generation from the operating system RNG so tests can
//! run against a seeded generator and reproduce exact envelopes. Production
//! code uses [`OsEntropy`].

use std::sync::{Mutex, PoisonError};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::CryptoError;

/// Source of random bytes for private keys, IVs and padding.
///
/// # Invariants
///
/// - Production implementations MUST be cryptographically secure
/// - A failing source MUST report an error rather than return weak bytes
pub trait Entropy: Send + Sync {
    /// Fills `buffer` entirely with random bytes.
    fn fill(&self, buffer: &mut [u8]) -> Result<(), CryptoError>;

    /// Returns `N` fresh random bytes.
    fn array<const N: usize>(&self) -> Result<[u8; N], CryptoError>
    where
        Self: Sized,
    {
        let mut bytes = [0u8; N];
        self.fill(&mut bytes)?;
        Ok(bytes)
    }
}

impl<E: Entropy + ?Sized> Entropy for &E {
    fn fill(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        (**self).fill(buffer)
    }
}

/// Operating system RNG (getrandom).
///
/// Backed by `getrandom` (e.g. `getrandom(2)` on Linux, `BCryptGenRandom` on
/// Windows). Not reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl Entropy for OsEntropy {
    fn fill(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        getrandom::fill(buffer)
            .map_err(|e| CryptoError::EntropyUnavailable { reason: e.to_string() })
    }
}

/// Deterministic ChaCha20 generator for tests and fuzzing.
///
/// Same seed, same byte sequence. Never use for real keys.
#[derive(Debug)]
pub struct SeededEntropy {
    rng: Mutex<ChaCha20Rng>,
}

impl SeededEntropy {
    /// Create a generator from a 64-bit seed.
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)) }
    }
}

impl Entropy for SeededEntropy {
    fn fill(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        // A panic while holding the lock leaves the RNG state intact.
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.fill_bytes(buffer);
        Ok(())
    }
}
