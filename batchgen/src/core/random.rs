//! Uniform selection backed by a cryptographically strong generator.
//!
//! All randomness in the crate flows through [`RandomSource`] so that prompt
//! construction and guidance sampling stay deterministic under test.

use rand::Rng;
use rand::rngs::ThreadRng;

/// Source of uniform draws.
pub trait RandomSource {
    /// Uniform value in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform index in `0..len`. Callers guarantee `len > 0`.
    fn index(&mut self, len: usize) -> usize;
}

/// Thread-local ChaCha-based CSPRNG, reseeded from the operating system.
pub struct SystemRandom {
    rng: ThreadRng,
}

impl SystemRandom {
    pub fn new() -> Self {
        Self { rng: rand::rng() }
    }
}

impl Default for SystemRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandom {
    fn unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn index(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }
}

/// Pick one element uniformly. Empty input yields `None`, never an error.
pub fn pick<'a, R: RandomSource + ?Sized>(rng: &mut R, items: &'a [String]) -> Option<&'a str> {
    if items.is_empty() {
        return None;
    }
    let idx = rng.index(items.len());
    items.get(idx).map(String::as_str)
}
