//! cellsieve - Mixture-model QC CLI
//!
//! Command-line interface for classifying single-cell damage/complexity
//! metrics.

use cellsieve::benchmark::{generate_synthetic, SyntheticConfig};
use cellsieve::data::CellMetrics;
use cellsieve::error::Result;
use cellsieve::pipeline::{run_qc, QcConfig};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

/// Adaptive mixture-model quality control for single-cell metrics
#[derive(Parser)]
#[command(name = "cellsieve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a metrics TSV and write per-cell decisions
    Run {
        /// Path to metrics TSV (columns: cell_id, damage, complexity)
        #[arg(short, long)]
        metrics: PathBuf,

        /// Output path for decisions TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Optional QC configuration YAML
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Optional path for the full result set (model metadata,
        /// warnings, decisions) as JSON
        #[arg(long)]
        model_json: Option<PathBuf>,

        /// Posterior cutoff override
        #[arg(long)]
        cutoff: Option<f64>,

        /// Random seed override
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Write a synthetic two-population metrics TSV
    Simulate {
        /// Output path for metrics TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Number of intact cells
        #[arg(long, default_value = "900")]
        intact: usize,

        /// Number of compromised cells
        #[arg(long, default_value = "100")]
        compromised: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            metrics,
            output,
            config,
            model_json,
            cutoff,
            seed,
        } => cmd_run(
            &metrics,
            &output,
            config.as_ref(),
            model_json.as_ref(),
            cutoff,
            seed,
        ),

        Commands::Simulate {
            output,
            intact,
            compromised,
            seed,
        } => cmd_simulate(&output, intact, compromised, seed),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Classify a metrics file.
fn cmd_run(
    metrics_path: &PathBuf,
    output_path: &PathBuf,
    config_path: Option<&PathBuf>,
    model_json_path: Option<&PathBuf>,
    cutoff: Option<f64>,
    seed: Option<u64>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => {
            eprintln!("Loading QC configuration from {:?}...", path);
            QcConfig::from_yaml(&fs::read_to_string(path)?)?
        }
        None => QcConfig::default(),
    };
    if let Some(cutoff) = cutoff {
        config = config.with_cutoff(cutoff);
    }
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }

    eprintln!("Loading metrics from {:?}...", metrics_path);
    let metrics = CellMetrics::from_tsv(metrics_path)?;
    eprintln!("Classifying {} cells...", metrics.len());

    let results = run_qc(&metrics, &config)?;
    for warning in &results.warnings {
        eprintln!("Warning: {}", warning);
    }

    eprintln!("Writing decisions to {:?}...", output_path);
    results.write_tsv(output_path)?;
    if let Some(path) = model_json_path {
        fs::write(path, results.to_json()?)?;
    }
    eprintln!("{}", results.summary());
    Ok(())
}

/// Write synthetic metrics with known ground truth.
fn cmd_simulate(output_path: &PathBuf, intact: usize, compromised: usize, seed: u64) -> Result<()> {
    let config = SyntheticConfig::default()
        .with_populations(intact, compromised)
        .with_seed(seed);
    let data = generate_synthetic(&config)?;
    data.metrics.to_tsv(output_path)?;
    eprintln!(
        "Wrote {} cells ({} intact, {} compromised) to {:?}",
        data.metrics.len(),
        intact,
        compromised,
        output_path
    );
    Ok(())
}
