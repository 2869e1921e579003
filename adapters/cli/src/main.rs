#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives the wave orchestrator headlessly.

mod simulation;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wave_forge_orchestrator::{query, OrchestratorConfig, WaveOrchestrator};

use simulation::Simulation;

/// Runs simulated waves against a stand-in unit system.
#[derive(Debug, Parser)]
#[command(name = "wave-forge", version, about)]
struct CliArgs {
    /// TOML file with orchestrator settings.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 2_000)]
    ticks: u32,
    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
    /// Overrides the faction seed of a new session.
    #[arg(long)]
    seed: Option<u64>,
    /// Ticks a spawned unit lives before it is killed.
    #[arg(long, default_value_t = 20)]
    unit_lifetime_ticks: u32,
    /// Writes the orchestrator state to this JSON file when the run ends.
    #[arg(long)]
    save: Option<PathBuf>,
    /// Resumes from a JSON file written by `--save`.
    #[arg(long)]
    load: Option<PathBuf>,
}

/// Entry point for the wave-forge command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    let mut simulation = Simulation::new(args.unit_lifetime_ticks);
    let mut orchestrator = match &args.load {
        Some(path) => {
            if args.seed.is_some() || args.config.is_some() {
                warn!("--seed and --config are ignored when resuming with --load");
            }
            let mut orchestrator = load_session(path)?;
            simulation.adopt(&mut orchestrator);
            orchestrator
        }
        None => {
            let mut config = match &args.config {
                Some(path) => read_config(path)?,
                None => OrchestratorConfig::default(),
            };
            if let Some(seed) = args.seed {
                config.faction_seed = seed;
            }
            WaveOrchestrator::new(config)
        }
    };

    let report = simulation.run(
        &mut orchestrator,
        args.ticks,
        Duration::from_millis(args.tick_ms),
    );
    let statistics = query::statistics(&orchestrator);

    println!("ticks simulated:      {}", report.ticks);
    println!("spawn requests:       {}", report.spawn_requests);
    println!("rejected spawns:      {}", report.rejected_spawns);
    println!("waves completed:      {}", report.waves_completed);
    println!("waves failed:         {}", report.waves_failed);
    println!("performance warnings: {}", report.performance_warnings);
    println!("highest wave:         {}", statistics.highest_wave);
    println!("units killed:         {}", statistics.total_units_killed);
    println!("average wave length:  {:.2}s", statistics.average_duration);
    println!("final state:          {}", query::state(&orchestrator));
    if let Some(message) = query::error_message(&orchestrator) {
        println!("error:                {message}");
    }

    if let Some(path) = &args.save {
        let json = orchestrator.to_json()?;
        fs::write(path, json)
            .with_context(|| format!("failed to write session to {}", path.display()))?;
        info!(path = %path.display(), "session saved");
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_config(path: &Path) -> Result<OrchestratorConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config {}", path.display()))
}

fn parse_config(contents: &str) -> Result<OrchestratorConfig> {
    Ok(toml::from_str(contents)?)
}

fn load_session(path: &Path) -> Result<WaveOrchestrator> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read session {}", path.display()))?;
    WaveOrchestrator::from_json(&json)
        .with_context(|| format!("failed to restore session {}", path.display()))
}
