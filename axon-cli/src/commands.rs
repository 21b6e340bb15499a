use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use validator::Validate;

use axon_config::AxonConfig;
use axon_simulator::Scenario;
use axon_telemetry::{RunLogger, RunMetrics};

#[derive(Parser)]
#[command(name = "axon", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the configured scenario and print its report
    Run(RunArgs),
    /// Load and validate configuration, then print it resolved
    CheckConfig(CheckConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Configuration file; defaults to config/axon.yaml plus config/<AXON_ENV>.yaml
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Worker pool size, overriding the configuration
    #[arg(short, long)]
    pub workers: Option<usize>,
    /// Scenario seed, overriding the configuration
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckConfigArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_scenario(args),
        Commands::CheckConfig(args) => check_config(args.config.as_deref()),
    }
}

fn load(path: Option<&Path>) -> anyhow::Result<AxonConfig> {
    match path {
        Some(path) => AxonConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display())),
        None => AxonConfig::load().context("loading configuration"),
    }
}

fn run_scenario(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load(args.config.as_deref())?;
    if let Some(workers) = args.workers {
        config.runtime.workers = workers;
    }
    if let Some(seed) = args.seed {
        config.scenario.seed = seed;
    }
    config
        .validate()
        .map_err(axon_config::ConfigError::from)
        .context("invalid command line overrides")?;

    RunLogger::init(&config.telemetry.log_level)?;
    info!(
        workers = config.runtime.workers,
        seed = config.scenario.seed,
        "starting axon"
    );

    let mut scenario = Scenario::build(&config.scenario, &config.runtime)?;
    let metrics = if config.telemetry.metrics {
        let metrics = Arc::new(RunMetrics::new()?);
        scenario = scenario.with_metrics(Arc::clone(&metrics));
        Some(metrics)
    } else {
        None
    };

    let report = scenario.run()?;
    print!("{}", serde_yaml::to_string(&report)?);
    if let Some(metrics) = metrics {
        print!("{}", metrics.gather_metrics()?);
    }
    Ok(())
}

fn check_config(path: Option<&Path>) -> anyhow::Result<()> {
    let config = load(path)?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}
