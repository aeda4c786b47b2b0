//! Seeded value source for gauge updates.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Half-open interval gauge values are drawn from.
pub const VALUE_RANGE: Range<f64> = 0.0..100.0;

/// Odd 64-bit constant used to spread target indices across the seed space.
const INDEX_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Per-target random number generator.
///
/// Each target gets its own generator derived from the global seed and the
/// target index, so a target's value sequence does not depend on how the
/// runtime interleaves the other targets.
#[derive(Debug, Clone)]
pub struct ValueSampler {
    rng: StdRng,
}

impl ValueSampler {
    /// Create the sampler for target `index` under `seed`.
    pub fn new(seed: u64, index: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(derive_seed(seed, index)),
        }
    }

    /// Draw the next value, uniform over [`VALUE_RANGE`].
    pub fn sample(&mut self) -> f64 {
        self.rng.random_range(VALUE_RANGE)
    }
}

/// Target 0 uses the global seed unchanged.
fn derive_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64).wrapping_mul(INDEX_MIX)
}
