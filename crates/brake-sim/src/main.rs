//! brake-sim - replay braking scenarios against the AutoBrake controller

use anyhow::{bail, Context};
use auto_brake::AutoBrakeConfig;
use brake_sim::{init_logging, replay_file};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "brake-sim",
    version,
    about = "Replay braking scenarios against the AutoBrake controller"
)]
struct Args {
    /// AutoBrake configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print one JSON report per scenario
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Scenario files (JSON)
    #[arg(required = true)]
    scenarios: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    info!("=== brake-sim v{} ===", env!("CARGO_PKG_VERSION"));

    let base = AutoBrakeConfig::load(args.config.as_deref())
        .context("Failed to load AutoBrake configuration")?;

    let mut failed = 0;
    for path in &args.scenarios {
        let report = replay_file(path, &base).await;

        if args.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!("{}", report);
        }

        if !report.passed() {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} of {} scenarios failed", failed, args.scenarios.len());
    }
    Ok(())
}
