use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::io;
use std::path::PathBuf;

use pbpk_simulation::output::{self, RunSummary};
use pbpk_simulation::{simulate_sweep, Config, Matrix, ModelVariant, Simulator};

#[derive(Parser)]
#[command(name = "pbpk_simulation")]
#[command(about = "Physiologically-based pharmacokinetic simulation program")]
struct Cli {
    /// Run configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model variant; without --config, runs that variant's reference case
    #[arg(long, value_enum)]
    variant: Option<ModelVariant>,

    /// Concentration reported for the blood pools
    #[arg(short, long, value_enum, default_value = "plasma")]
    matrix: Matrix,

    /// Print a JSON run summary instead of the concentration table
    #[arg(short, long)]
    summary: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let config = match (&cli.config, cli.variant) {
        (Some(path), variant) => {
            let mut config = Config::from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path))?;
            if let Some(variant) = variant {
                config.model.variant = variant;
                config.validate()?;
            }
            info!("Loaded configuration from {:?}", path);
            config
        }
        (None, Some(variant)) => {
            info!("Running the {} reference case", variant);
            Config::reference(variant)
        }
        (None, None) => bail!("Either --config or --variant is required"),
    };

    let stdout = io::stdout().lock();

    if let Some(sweep) = &config.sweep {
        let points = simulate_sweep(&config, &sweep.parameter, &sweep.values)
            .context("Parameter sweep failed")?;
        output::write_sweep(&points, cli.matrix, stdout)?;
        return Ok(());
    }

    let simulator = Simulator::new(&config).context("Invalid model")?;
    let result = simulator.run().context("Simulation failed")?;

    if cli.summary {
        let summary = RunSummary::from_result(&result, cli.matrix)?;
        output::write_summary(&summary, stdout)?;
        println!();
    } else {
        output::write_concentrations(&result, cli.matrix, stdout)?;
    }

    Ok(())
}
