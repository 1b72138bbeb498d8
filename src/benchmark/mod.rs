//! Synthetic data generation for benchmarking and testing.

mod generate;

pub use generate::{generate_synthetic, SyntheticConfig, SyntheticData};
