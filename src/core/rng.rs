//! Secure Random Draws
//!
//! Unbiased integer draws, shuffling and coin flips on top of any
//! [`RngCore`]. The server passes [`OsRng`]; tests pass seeded or failing
//! generators.
//!
//! Every draw goes through `try_fill_bytes`, so an unavailable entropy
//! source surfaces as [`RngError`] instead of a panic or a weaker fallback.

use rand::RngCore;
use thiserror::Error;

pub use rand::rngs::OsRng;

/// Randomness source failure.
#[derive(Debug, Error)]
pub enum RngError {
    /// The underlying generator could not produce bytes.
    #[error("randomness source unavailable: {0}")]
    Unavailable(#[from] rand::Error),
}

/// Draw a single `u32` from the generator.
#[inline]
fn next_u32<R: RngCore + ?Sized>(rng: &mut R) -> Result<u32, RngError> {
    let mut buf = [0u8; 4];
    rng.try_fill_bytes(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Generate a uniform integer in range [0, bound).
///
/// Uses rejection sampling: draws in the incomplete top bucket are
/// discarded so every result is equally likely.
pub fn uniform_below<R: RngCore + ?Sized>(rng: &mut R, bound: u32) -> Result<u32, RngError> {
    if bound <= 1 {
        return Ok(0);
    }

    let zone = u32::MAX - (u32::MAX - bound + 1) % bound;
    loop {
        let value = next_u32(rng)?;
        if value <= zone {
            return Ok(value % bound);
        }
    }
}

/// Shuffle a slice in place (Fisher-Yates).
///
/// Each swap partner for position `i` is drawn uniformly from `[0, i]`.
pub fn shuffle<T, R: RngCore + ?Sized>(rng: &mut R, items: &mut [T]) -> Result<(), RngError> {
    for i in (1..items.len()).rev() {
        let j = uniform_below(rng, i as u32 + 1)? as usize;
        items.swap(i, j);
    }
    Ok(())
}

/// Fair coin flip.
pub fn coin_flip<R: RngCore + ?Sized>(rng: &mut R) -> Result<bool, RngError> {
    Ok(uniform_below(rng, 2)? == 1)
}

/// Generator that always fails. Used to exercise creation-failure paths.
#[cfg(test)]
pub(crate) struct FailingRng;

#[cfg(test)]
impl RngCore for FailingRng {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        0
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0);
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
        Err(rand::Error::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            "entropy source offline",
        )))
    }
}
