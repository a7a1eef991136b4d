//! Synthetic companion channel.
//!
//! When only one physical sensor is available, the second channel is derived
//! from the first by adding zero-mean Gaussian noise. This is a stand-in for
//! an independent second person and is reported as such in logs and in
//! [`crate::SYNTHETIC_COMPANION_NOTICE`].

use crate::sensor::types::Sample;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;

/// Generates a noisy copy of a source sample.
pub struct CompanionGenerator {
    rng: StdRng,
    noise: Option<Normal>,
    std_dev: f64,
}

impl CompanionGenerator {
    /// Create a generator with the given noise standard deviation.
    ///
    /// A `seed` makes the output reproducible. A standard deviation of zero (or
    /// anything that is not a positive finite number) produces exact copies.
    pub fn new(std_dev: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let noise = if std_dev.is_finite() && std_dev > 0.0 {
            Normal::new(0.0, std_dev).ok()
        } else {
            None
        };

        let effective = if noise.is_some() { std_dev } else { 0.0 };

        Self {
            rng,
            noise,
            std_dev: effective,
        }
    }

    /// The effective noise standard deviation.
    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    /// Produce the companion of `source`, keeping its timestamp.
    pub fn companion(&mut self, source: &Sample) -> Sample {
        let jitter = match &self.noise {
            Some(normal) => normal.sample(&mut self.rng),
            None => 0.0,
        };
        Sample::new(source.timestamp, source.value + jitter)
    }

    /// Derive a whole companion series from `values`.
    pub fn companion_series(&mut self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| self.companion(&Sample::new(i as f64, v)).value)
            .collect()
    }
}
