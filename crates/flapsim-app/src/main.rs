use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use flapsim_app::{GenerationRunner, TraceObserver, load_config, write_report};
use flapsim_brain::{Activation, GapChaserBrain, MlpBrain, MlpConfig};
use flapsim_core::{Evaluator, FlapConfig, InterruptFlag, PolicyRegistry};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "flapsim",
    version,
    about = "Evaluate generations of bird controllers against a scrolling pipe course"
)]
struct Cli {
    /// JSON configuration file; omitted fields keep their defaults.
    #[arg(short, long, env = "FLAPSIM_CONFIG")]
    config: Option<PathBuf>,
    /// Controller family to spawn each generation.
    #[arg(long, value_enum, default_value_t = BrainChoice::Mlp)]
    brain: BrainChoice,
    /// Birds per generation.
    #[arg(short, long, default_value_t = 50)]
    population: usize,
    /// Override `max_generations`.
    #[arg(short, long)]
    generations: Option<u32>,
    /// Override `score_threshold`.
    #[arg(long)]
    score_threshold: Option<u32>,
    /// Seed for pipe placement and controller initialization.
    #[arg(long, env = "FLAPSIM_SEED")]
    seed: Option<u64>,
    /// Keep the configured tick rate instead of running as fast as possible.
    #[arg(long)]
    realtime: bool,
    /// Hidden layer widths for the MLP brain (comma separated).
    #[arg(long, value_delimiter = ',', default_values_t = [6])]
    hidden: Vec<usize>,
    /// Flap only when this far below the gap middle (gap-chaser brain).
    #[arg(long, default_value_t = 0.0)]
    slack: f64,
    /// Log every N-th frame at trace level; 0 disables frame logging.
    #[arg(long, default_value_t = 0)]
    frame_stride: u64,
    /// Write a JSON run report to this path.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum BrainChoice {
    /// Randomly initialized feed-forward network.
    Mlp,
    /// Scripted controller steering for the gap middle.
    Chaser,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    info!(
        population = cli.population,
        generations = config.max_generations,
        score_threshold = config.score_threshold,
        tick_rate_hz = config.tick_rate_hz,
        "starting flapsim run"
    );

    let evaluator = Evaluator::new(config).context("invalid configuration")?;
    let mut registry = PolicyRegistry::new();
    let factory = match cli.brain {
        BrainChoice::Mlp => {
            let mlp = MlpConfig {
                hidden_layers: cli.hidden.clone(),
                activation: Activation::Tanh,
                ..MlpConfig::default()
            };
            MlpBrain::register(&mut registry, mlp).context("invalid MLP architecture")?
        }
        BrainChoice::Chaser => GapChaserBrain::register(&mut registry, cli.slack),
    };

    let mut runner = GenerationRunner::new(evaluator, registry, factory, cli.population)?;
    spawn_interrupt_listener(runner.interrupt_flag())?;
    let mut observer = TraceObserver::new(cli.frame_stride);
    let summary = runner.run(&mut observer)?;

    match summary.best_generation() {
        Some(best) => info!(
            stop = ?summary.stop,
            generations = summary.generations.len(),
            best_generation = best.generation.0,
            best_fitness = best.best_fitness,
            best_score = best.score,
            "run finished"
        ),
        None => warn!(stop = ?summary.stop, "run finished without evaluating a generation"),
    }

    if let Some(path) = &cli.report {
        write_report(path, &summary)?;
        info!(path = %path.display(), "wrote run report");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn resolve_config(cli: &Cli) -> Result<FlapConfig> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(generations) = cli.generations {
        config.max_generations = generations;
    }
    if let Some(threshold) = cli.score_threshold {
        config.score_threshold = threshold;
    }
    if cli.seed.is_some() {
        config.rng_seed = cli.seed;
    }
    if !cli.realtime {
        config.tick_rate_hz = 0;
    }
    Ok(config)
}

/// Raise `flag` on Ctrl-C so the current generation ends at the next tick.
fn spawn_interrupt_listener(flag: InterruptFlag) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    std::thread::Builder::new()
        .name("flapsim-signal".into())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        warn!("interrupt received, finishing current tick");
                        flag.raise();
                    }
                    Err(err) => warn!(%err, "failed to listen for ctrl-c"),
                }
            });
        })
        .context("failed to spawn signal thread")?;
    Ok(())
}
