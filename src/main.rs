// iothrottle - Leaky Bucket Throttle CLI
//
// Inspects a throttle configuration and replays synthetic workloads against
// it on a simulated clock:
// - show: print the configured throttle as JSON
// - simulate: issue operations, advancing time whenever admission is denied

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use io_throttle::{logging, FakeClock, ThrottleConfig, ThrottleSnapshot};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// iothrottle: leaky bucket I/O admission control
#[derive(Parser, Debug)]
#[command(name = "iothrottle")]
#[command(version)]
#[command(about = "Inspect and simulate a leaky bucket I/O throttle", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the throttle built from a config file (or IOTHROTTLE_* variables)
    Show {
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Replay a fixed-size workload on a simulated clock
    Simulate {
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of operations to issue
        #[arg(long, default_value_t = 1000)]
        ops: u64,

        /// Size of each operation in bytes
        #[arg(long, default_value_t = 4096)]
        size: u64,

        /// Simulated milliseconds to wait after a denied admission
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
        tick_ms: u64,

        /// Raise the adaptive average every N admitted operations
        #[arg(long)]
        increase_every: Option<u64>,

        /// Give up after this many denied admissions
        #[arg(long, default_value_t = 1_000_000)]
        max_denials: u64,
    },
}

/// Outcome of a simulation run
#[derive(Debug, Serialize)]
struct SimulationSummary {
    admitted: u64,
    denials: u64,
    increases: u64,
    simulated_secs: f64,
    bytes_per_sec: Option<f64>,
    ops_per_sec: Option<f64>,
    throttle: ThrottleSnapshot,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose, args.log_json);

    match args.command {
        Commands::Show { config } => {
            let config = load_config(config.as_deref())?;
            let throttle = config
                .build(io_throttle::Clock::real())
                .context("Failed to configure throttle")?;
            let snapshot = throttle.snapshot();
            info!(mode = %snapshot.mode, enabled = snapshot.enabled, "throttle configured");
            println!("{}", snapshot.to_json_pretty()?);
        }
        Commands::Simulate {
            config,
            ops,
            size,
            tick_ms,
            increase_every,
            max_denials,
        } => {
            let config = load_config(config.as_deref())?;
            let summary = simulate(
                &config,
                ops,
                size,
                Duration::from_millis(tick_ms),
                increase_every,
                max_denials,
            )?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ThrottleConfig> {
    match path {
        Some(path) => ThrottleConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            debug!("No config file given, reading IOTHROTTLE_* variables");
            Ok(ThrottleConfig::from_env())
        }
    }
}

fn simulate(
    config: &ThrottleConfig,
    ops: u64,
    size: u64,
    tick: Duration,
    increase_every: Option<u64>,
    max_denials: u64,
) -> Result<SimulationSummary> {
    let fake = FakeClock::new();
    let throttle = config
        .build(fake.clock())
        .context("Failed to configure throttle")?;
    let start = fake.now();

    info!(
        ops,
        size,
        mode = %throttle.mode(),
        enabled = throttle.enabled(),
        "starting simulation"
    );

    let mut admitted: u64 = 0;
    let mut denials: u64 = 0;
    let mut increases: u64 = 0;
    while admitted < ops {
        if !throttle.can_schedule() {
            denials += 1;
            if denials > max_denials {
                bail!(
                    "Gave up after {} denied admissions ({} of {} operations admitted)",
                    max_denials,
                    admitted,
                    ops
                );
            }
            fake.advance(tick);
            continue;
        }

        throttle.account(size);
        admitted += 1;

        if let Some(every) = increase_every.filter(|every| *every > 0) {
            // Calls after saturation are no-ops and are not counted
            if admitted % every == 0 && !throttle.avg_is_max() {
                throttle.increase_average();
                increases += 1;
            }
        }
    }

    let simulated_secs = (fake.now() - start).as_secs_f64();
    let rate = |total: f64| (simulated_secs > 0.0).then(|| total / simulated_secs);

    Ok(SimulationSummary {
        admitted,
        denials,
        increases,
        simulated_secs,
        bytes_per_sec: rate(admitted.saturating_mul(size) as f64),
        ops_per_sec: rate(admitted as f64),
        throttle: throttle.snapshot(),
    })
}
