//! Braking Scenario Replay
//!
//! Replays recorded or hand-written event sequences through an
//! [`InProcessBus`](brake_bus::InProcessBus) wired to an
//! [`AutoBrake`](auto_brake::AutoBrake) controller and checks the brake
//! commands it issues.

mod recorder;
mod runner;
mod scenario;

pub use recorder::BrakeLog;
pub use runner::{replay_file, run_scenario, Outcome, ScenarioReport};
pub use scenario::{Expectation, Scenario};

use auto_brake::AutoBrakeError;
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Scenario replay errors
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Invalid AutoBrake configuration: {0}")]
    Config(#[from] AutoBrakeError),

    #[error("Failed to read scenario {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scenario: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Initialize logging to stderr, filtered by `RUST_LOG` (default `info`)
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
