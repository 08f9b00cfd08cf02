//! Seeded Random Number Generation
//!
//! Every random draw in a run comes from a generator seeded by the
//! configuration, so placement and link loss are reproducible:
//! - Initial follower placement
//! - Packet loss on the simulated link

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic random number generator
#[derive(Debug, Clone)]
pub struct SimRng {
    inner: StdRng,
}

impl SimRng {
    /// Create a generator from a seed
    pub fn new(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate a random f64 in range [0.0, 1.0)
    pub fn next_f64(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Generate a random f64 in range [min, max)
    pub fn next_f64_range(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        self.inner.gen_range(min..max)
    }

    /// Return true with probability `p` (clamped to [0, 1])
    pub fn chance(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        self.next_f64() < p.min(1.0)
    }
}
