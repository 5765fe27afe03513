use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use htmodel_estimate::{Estimate, Estimator};
use htmodel_schemas::{SutConfig, load_config, load_dataset};
use itertools::Itertools;
use mimalloc::MiMalloc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Estimate per-physical-core IPC under SMT from performance-counter traces
/// and derive productivity, thread-density, busy-time and frequency metrics.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    command: Commands,
}

/// The experiment to analyze.
#[derive(Args)]
struct Input {
    /// System-under-test configuration (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Per-interval counter dataset (JSON)
    #[arg(short, long)]
    dataset: PathBuf,

    /// Label of the test run; names the report directory
    #[arg(short, long)]
    test_name: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit IPC models and export LRModel.csv
    ///
    /// Writes `<output_dir>/<test_name>/LRModel.csv` with the run-level
    /// columns, system means and per-core estimated and measured IPC.
    Estimate {
        #[command(flatten)]
        input: Input,

        /// Overrides `output_dir` from the configuration
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Fit IPC models and write them as JSON
    Fit {
        #[command(flatten)]
        input: Input,

        /// Output file path (writes to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print fitted coefficients and system means
    Summary {
        #[command(flatten)]
        input: Input,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays pipeable. Default to warn,
    // allowlist our crates.
    const CRATES: &[&str] = &[
        "htmodel",
        "htmodel_estimate",
        "htmodel_regress",
        "htmodel_schemas",
    ];
    let level = cli.verbose.tracing_level_filter();
    let allowlist = CRATES.iter().map(|c| format!("{c}={level}")).join(",");
    let filter = EnvFilter::new(format!("warn,{allowlist}"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let stdout = std::io::stdout();
    match cli.command {
        Commands::Estimate { input, output_dir } => {
            let mut config = read_config(&input)?;
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            let dataset = load_dataset(&input.dataset).with_context(|| {
                format!("failed to load dataset {}", input.dataset.display())
            })?;
            let estimate =
                Estimator::new(&config).estimate(&dataset, &input.test_name)?;
            info!(
                cores = estimate.per_core.len(),
                ht_active = estimate.ht_active,
                "estimate complete"
            );
            Ok(())
        }
        Commands::Fit { input, output } => {
            let estimate = compute(&input)?;
            let mut writer: Box<dyn Write> = match output {
                Some(path) => Box::new(BufWriter::new(File::create(path)?)),
                None => Box::new(stdout.lock()),
            };
            htmodel_estimate::write_models(&estimate.models(), &mut writer)?;
            writer.flush()?;
            Ok(())
        }
        Commands::Summary { input } => {
            let estimate = compute(&input)?;
            estimate.write_summary(stdout.lock())?;
            Ok(())
        }
    }
}

fn read_config(input: &Input) -> Result<SutConfig> {
    load_config(&input.config).with_context(|| {
        format!("failed to load configuration {}", input.config.display())
    })
}

/// Computes the estimate without exporting a report.
fn compute(input: &Input) -> Result<Estimate> {
    let config = read_config(input)?;
    let file = File::open(&input.dataset).with_context(|| {
        format!("failed to open dataset {}", input.dataset.display())
    })?;
    let estimate = htmodel_estimate::run(
        std::io::BufReader::new(file),
        &config,
        &input.test_name,
    )?;
    Ok(estimate)
}
