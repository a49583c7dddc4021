//! Source of randomness for the simulated readings.
//!
//! The publisher never calls `rand` directly; it asks a [`RandomSource`].
//! Production uses [`SeededRandom`], tests plug in a fixed script.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Supplies the two random choices a timer makes.
pub trait RandomSource: Send + 'static {
    /// A uniformly chosen index in `0..len`. Callers never pass 0.
    fn index(&mut self, len: usize) -> usize;

    /// A uniformly chosen value in `[0, 1)`.
    fn unit(&mut self) -> f64;
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn index(&mut self, len: usize) -> usize {
        (**self).index(len)
    }

    fn unit(&mut self) -> f64 {
        (**self).unit()
    }
}

/// [`RandomSource`] backed by `StdRng`.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    /// Seeded from the thread-local generator; different every run.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Reproducible sequence for a given seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn index(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }

    fn unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}
