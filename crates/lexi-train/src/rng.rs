//! Deterministic PRNG for parameter initialization, timestep and noise
//! sampling.
//!
//! Splitmix64-based, so two runs with the same seed draw bit-identical
//! initial parameters, timesteps and noise; the training loop's
//! determinism guarantee rests on this plus the fixed batch order.

/// Deterministic PRNG based on splitmix64.
///
/// # Example
///
/// ```
/// use lexi_train::rng::SimpleRng;
///
/// let mut rng = SimpleRng::new(1000);
/// let t = rng.next_range(1000);
/// assert!(t < 1000);
/// ```
#[derive(Debug, Clone)]
pub struct SimpleRng(u64);

impl SimpleRng {
    /// Creates a new PRNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the next pseudo-random u64.
    pub fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e3779b97f4a7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^ (z >> 31)
    }

    /// Returns a uniform f32 in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / ((1u64 << 24) as f32)
    }

    /// Returns a uniform index in [0, bound). `bound` must be nonzero.
    pub fn next_range(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }

    /// Returns a standard-normal sample via Box-Muller.
    pub fn next_standard_normal(&mut self) -> f32 {
        // Shift u1 away from zero so ln() stays finite.
        let u1 = (self.next_f32() + 1e-7).min(1.0);
        let u2 = self.next_f32();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
    }

    /// Fills a vector with standard-normal samples.
    pub fn normal_vec(&mut self, len: usize) -> Vec<f32> {
        (0..len).map(|_| self.next_standard_normal()).collect()
    }
}
