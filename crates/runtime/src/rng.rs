//! Deterministic random number generation.
//!
//! Rand nodes draw from SplitMix64: fast, portable, and reproducible
//! from a seed, so hosts that record the seed can replay a session
//! exactly. Unseeded sessions draw their seed from the clock.

/// A deterministic pseudo-random number stream.
///
/// Each call to a generation method advances the stream state; streams
/// never reset, so a stable call sequence yields a stable run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngStream {
    state: u64,
}

impl RngStream {
    /// Create a new RNG stream from a seed.
    #[inline]
    pub const fn new(seed: u64) -> Self {
        // Ensure non-zero state (SplitMix64 requirement)
        let state = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state }
    }

    /// Create a stream seeded from the wall clock.
    pub fn from_time() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::new(nanos)
    }

    /// Get the current internal state (for debugging/testing).
    #[inline]
    pub const fn state(&self) -> u64 {
        self.state
    }

    /// Generate the next random u64 value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.state = splitmix64_next(self.state);
        splitmix64_mix(self.state)
    }

    /// Uniform index into a list of `len` destinations.
    #[inline]
    pub fn pick_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        (self.next_u64() % len as u64) as usize
    }
}

/// SplitMix64 state transition function.
#[inline]
const fn splitmix64_next(state: u64) -> u64 {
    state.wrapping_add(0x9E3779B97F4A7C15)
}

/// SplitMix64 mixing function.
#[inline]
const fn splitmix64_mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
