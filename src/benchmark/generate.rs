//! Synthetic metric generation for benchmarking and testing.
//!
//! Generates damage/complexity pairs with known population membership for
//! validating the classifier: an intact population (low damage, high
//! complexity) and an optional compromised population (high damage, low
//! complexity), each with a linear damage trend over complexity plus
//! Gaussian noise.

use crate::data::CellMetrics;
use crate::error::{QcError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for synthetic metric generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Name/identifier for this dataset.
    pub name: String,
    /// Number of intact cells.
    pub n_intact: usize,
    /// Number of compromised cells.
    pub n_compromised: usize,
    /// Mean damage of intact cells at mid-range complexity.
    pub intact_damage_mean: f64,
    /// Damage change per unit of complexity, intact population.
    pub intact_damage_slope: f64,
    /// Residual sd of intact damage.
    pub intact_sd: f64,
    /// Complexity range of intact cells.
    pub intact_complexity: (f64, f64),
    /// Mean damage of compromised cells at mid-range complexity.
    pub compromised_damage_mean: f64,
    /// Damage change per unit of complexity, compromised population.
    pub compromised_damage_slope: f64,
    /// Residual sd of compromised damage.
    pub compromised_sd: f64,
    /// Complexity range of compromised cells.
    pub compromised_complexity: (f64, f64),
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "synthetic".to_string(),
            n_intact: 900,
            n_compromised: 100,
            intact_damage_mean: 2.0,
            intact_damage_slope: -0.0002,
            intact_sd: 0.8,
            intact_complexity: (1500.0, 6000.0),
            compromised_damage_mean: 25.0,
            compromised_damage_slope: -0.004,
            compromised_sd: 5.0,
            compromised_complexity: (200.0, 2500.0),
            seed: 42,
        }
    }
}

impl SyntheticConfig {
    /// Create a config with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// A single intact population with no compromised cells.
    pub fn single_population(n: usize) -> Self {
        Self {
            name: "single_population".to_string(),
            n_intact: n,
            n_compromised: 0,
            ..Default::default()
        }
    }

    /// Set population sizes.
    pub fn with_populations(mut self, n_intact: usize, n_compromised: usize) -> Self {
        self.n_intact = n_intact;
        self.n_compromised = n_compromised;
        self
    }

    /// Set mid-range damage means for the two populations.
    pub fn with_damage_levels(mut self, intact: f64, compromised: f64) -> Self {
        self.intact_damage_mean = intact;
        self.compromised_damage_mean = compromised;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Synthetic metrics with ground-truth membership.
#[derive(Debug, Clone)]
pub struct SyntheticData {
    /// The generated metric pair.
    pub metrics: CellMetrics,
    /// True membership flags, aligned with the metrics (true = compromised).
    pub compromised: Vec<bool>,
}

/// Simple deterministic RNG (xorshift64).
struct Rng {
    state: u64,
}

impl Rng {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }

    fn next_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Generate a value from approximate normal distribution (Box-Muller).
    fn next_normal(&mut self, mean: f64, std: f64) -> f64 {
        let u1 = self.next_f64().max(1e-10);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std * z
    }
}

/// Generate synthetic metrics with known ground truth.
pub fn generate_synthetic(config: &SyntheticConfig) -> Result<SyntheticData> {
    let total = config.n_intact + config.n_compromised;
    if total == 0 {
        return Err(QcError::EmptyData(
            "synthetic config generates zero records".to_string(),
        ));
    }

    let mut rng = Rng::new(config.seed);
    let mut damage = Vec::with_capacity(total);
    let mut complexity = Vec::with_capacity(total);
    let mut compromised = Vec::with_capacity(total);

    let populations = [
        (
            config.n_intact,
            config.intact_complexity,
            config.intact_damage_mean,
            config.intact_damage_slope,
            config.intact_sd,
            false,
        ),
        (
            config.n_compromised,
            config.compromised_complexity,
            config.compromised_damage_mean,
            config.compromised_damage_slope,
            config.compromised_sd,
            true,
        ),
    ];

    for (n, (lo, hi), mean, slope, sd, is_compromised) in populations {
        let mid = 0.5 * (lo + hi);
        for _ in 0..n {
            let x = rng.next_range(lo, hi);
            let mu = mean + slope * (x - mid);
            let d = rng.next_normal(mu, sd).clamp(0.0, 100.0);
            complexity.push(x);
            damage.push(d);
            compromised.push(is_compromised);
        }
    }

    let metrics = CellMetrics::from_vectors(damage, complexity)?;
    Ok(SyntheticData {
        metrics,
        compromised,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyntheticConfig::default();
        assert_eq!(config.n_intact, 900);
        assert_eq!(config.n_compromised, 100);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_generate_counts_and_truth() {
        let config = SyntheticConfig::default().with_populations(30, 10);
        let data = generate_synthetic(&config).unwrap();
        assert_eq!(data.metrics.len(), 40);
        assert_eq!(data.compromised.iter().filter(|&&c| c).count(), 10);
        // Intact block precedes compromised block.
        assert!(!data.compromised[0]);
        assert!(data.compromised[39]);
    }

    #[test]
    fn test_same_seed_identical() {
        let config = SyntheticConfig::default().with_seed(123);
        let a = generate_synthetic(&config).unwrap();
        let b = generate_synthetic(&config).unwrap();
        assert_eq!(a.metrics.damage(), b.metrics.damage());
        assert_eq!(a.metrics.complexity(), b.metrics.complexity());
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = generate_synthetic(&SyntheticConfig::default().with_seed(1)).unwrap();
        let b = generate_synthetic(&SyntheticConfig::default().with_seed(2)).unwrap();
        assert_ne!(a.metrics.damage(), b.metrics.damage());
    }

    #[test]
    fn test_populations_are_separated() {
        let data = generate_synthetic(&SyntheticConfig::default()).unwrap();
        let damage = data.metrics.damage();
        let mean = |flag: bool| {
            let values: Vec<f64> = damage
                .iter()
                .zip(&data.compromised)
                .filter(|(_, &c)| c == flag)
                .map(|(&d, _)| d)
                .collect();
            values.iter().sum::<f64>() / values.len() as f64
        };
        assert!(mean(true) - mean(false) > 15.0);
    }

    #[test]
    fn test_single_population_has_no_compromised() {
        let data =
            generate_synthetic(&SyntheticConfig::single_population(50)).unwrap();
        assert_eq!(data.metrics.len(), 50);
        assert!(data.compromised.iter().all(|&c| !c));
    }

    #[test]
    fn test_empty_config_rejected() {
        let config = SyntheticConfig::default().with_populations(0, 0);
        assert!(generate_synthetic(&config).is_err());
    }
}
