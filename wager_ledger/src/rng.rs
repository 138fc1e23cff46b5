//! Deterministic per-account outcome generation.
//!
//! Each account carries a seed fixed at creation. Hashing that seed (plus any
//! caller entropy) keys a ChaCha20 stream, so the n-th draw for an account is
//! reproducible for audits yet unpredictable without the seed.

use crate::account::GamblerAccount;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Bytes of OS entropy behind every account seed
pub const SEED_BYTES: usize = 32;

/// Upper bound on draws per call
pub const MAX_ITERATIONS: u32 = 1_000_000;

/// Outcome generation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RngError {
    #[error("Invalid range: {min} > {max}")]
    InvalidRange { min: i64, max: i64 },

    #[error("Invalid iteration count {0} (must be between 1 and {MAX_ITERATIONS})")]
    InvalidIterations(u32),
}

pub type RngResult<T> = Result<T, RngError>;

/// Seeded outcome source
pub struct DeterministicRng;

impl DeterministicRng {
    /// Fresh hex-encoded seed from the thread-local OS-seeded generator
    pub fn generate_seed() -> String {
        let mut bytes = [0u8; SEED_BYTES];
        rand::rng().fill(&mut bytes);
        hex::encode(bytes)
    }

    /// Draw `iterations` values uniformly from `min..=max` and return the last.
    ///
    /// # Errors
    ///
    /// * `RngError::InvalidRange` - `min > max`
    /// * `RngError::InvalidIterations` - Zero or more than [`MAX_ITERATIONS`]
    pub fn next_in_range(
        account: &GamblerAccount,
        min: i64,
        max: i64,
        iterations: u32,
    ) -> RngResult<i64> {
        Self::draw(&account.random_seed, &[], min, max, iterations)
    }

    /// Like [`next_in_range`](Self::next_in_range), with `entropy` (a wager
    /// nonce, a client seed) mixed into the key.
    pub fn next_in_range_with_entropy(
        account: &GamblerAccount,
        entropy: &[u8],
        min: i64,
        max: i64,
        iterations: u32,
    ) -> RngResult<i64> {
        Self::draw(&account.random_seed, entropy, min, max, iterations)
    }

    /// Draw from an explicit seed
    pub fn draw(
        seed: &str,
        entropy: &[u8],
        min: i64,
        max: i64,
        iterations: u32,
    ) -> RngResult<i64> {
        if min > max {
            return Err(RngError::InvalidRange { min, max });
        }
        if iterations == 0 || iterations > MAX_ITERATIONS {
            return Err(RngError::InvalidIterations(iterations));
        }

        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        hasher.update(entropy);
        let key: [u8; 32] = hasher.finalize().into();

        let mut rng = ChaCha20Rng::from_seed(key);
        let mut value = min;
        for _ in 0..iterations {
            value = rng.random_range(min..=max);
        }
        Ok(value)
    }
}
