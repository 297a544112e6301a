//! fibstart CLI entry point.
//!
//! Loads a freestanding image into the hosted harness and either boots its
//! entry point or calls its exported computer.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fibstart_common::{ConfigFile, HarnessConfig};
use fibstart_harness::{HarnessEngine, ImageRunner, ProgramImage};

#[derive(Debug, Parser)]
#[command(name = "fibstart", version, about = "Boot and probe freestanding Fibonacci images")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, env = "FIBSTART_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    limits: Limits,

    /// Print reports as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Overrides for the boot limits in the configuration file.
#[derive(Debug, Args)]
struct Limits {
    /// Boot deadline in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Fuel budget per run [default: 1000000000]; call cost grows about
    /// 1.6x per index, so raise it past `n = 35`.
    #[arg(long, global = true)]
    max_fuel: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Boot the entry point and report the observed result once it halts.
    Boot {
        /// Image to boot (`.wasm` or `.wat`); defaults to `[image].path`.
        image: Option<PathBuf>,
    },
    /// Call the exported computer for each index.
    Call {
        /// Image to load (`.wasm` or `.wat`).
        image: PathBuf,

        /// Indices to compute.
        #[arg(required = true, allow_negative_numbers = true)]
        indices: Vec<i32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fibstart=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_file = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigFile::default(),
    };
    let harness = apply_limits(config_file.harness, &cli.limits);

    info!(
        timeout_ms = harness.boot.timeout_ms,
        max_fuel = harness.boot.max_fuel,
        "Configuration loaded"
    );

    let engine = HarnessEngine::new(&harness.engine)?;
    let runner = ImageRunner::new(engine.clone(), harness.boot);

    match cli.command {
        Command::Boot { image } => {
            let path = match image {
                Some(path) => path,
                None => match config_file.image {
                    Some(entry) => PathBuf::from(entry.path),
                    None => bail!("No image given and no [image] path in the configuration"),
                },
            };
            let image = load_image(&engine, &path)?;

            let report = runner.boot(&image).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{}: {} result={} (stopped by {:?} after {}ms, fuel {})",
                    path.display(),
                    report.state,
                    report.result,
                    report.stopped_by,
                    report.duration_ms,
                    report.fuel_consumed
                );
            }

            if !report.is_halted() {
                warn!(state = %report.state, "Image did not reach halt within its limits");
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Call { image, indices } => {
            let program = load_image(&engine, &image)?;

            for n in indices {
                let outcome = runner
                    .call(&program, n)
                    .await
                    .with_context(|| format!("fibonacci({n}) failed"))?;

                if cli.json {
                    println!("{}", serde_json::to_string(&outcome)?);
                } else {
                    println!("fibonacci({n}) = {}", outcome.value);
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_image(engine: &HarnessEngine, path: &std::path::Path) -> anyhow::Result<ProgramImage> {
    ProgramImage::from_file(engine.inner(), path)
        .with_context(|| format!("Failed to load image {}", path.display()))
}

fn apply_limits(mut config: HarnessConfig, limits: &Limits) -> HarnessConfig {
    if let Some(timeout_ms) = limits.timeout_ms {
        config.boot.timeout_ms = timeout_ms;
    }
    if let Some(max_fuel) = limits.max_fuel {
        config.boot.max_fuel = max_fuel;
    }
    config
}
