//! Scenario files

use auto_brake::{AutoBrakeConfig, BrakeState};
use brake_bus::{BrakeCommand, BusEvent};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::SimError;

/// Tolerance for floating point expectations
const EPSILON: f64 = 1e-9;

/// Event sequence to replay, with optional expectations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,

    /// Overrides the configured collision threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collision_threshold_s: Option<f64>,

    /// Overrides the configured initial speed limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_limit_mps: Option<u32>,

    /// Delivered in order
    pub events: Vec<BusEvent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<Expectation>,
}

/// Expected outcome after the last event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brake_commands: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_speed_mps: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_time_to_collision_s: Option<f64>,
}

impl Scenario {
    /// Parse a scenario from JSON
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a scenario file
    pub async fn load(path: &Path) -> Result<Self, SimError> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SimError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&json)
    }

    /// Apply this scenario's overrides to a base configuration
    pub fn config(&self, base: &AutoBrakeConfig) -> AutoBrakeConfig {
        AutoBrakeConfig {
            collision_threshold_s: self.collision_threshold_s.unwrap_or(base.collision_threshold_s),
            initial_speed_limit_mps: self.speed_limit_mps.unwrap_or(base.initial_speed_limit_mps),
        }
    }
}

impl Expectation {
    /// Compare against a replay result. Returns one message per mismatch.
    pub fn check(&self, commands: &[BrakeCommand], state: &BrakeState) -> Vec<String> {
        let mut failures = Vec::new();

        if let Some(expected) = self.brake_commands {
            if commands.len() != expected {
                failures.push(format!(
                    "expected {} brake commands, got {}",
                    expected,
                    commands.len()
                ));
            }
        }

        if let Some(expected) = self.final_speed_mps {
            if (state.speed_mps() - expected).abs() > EPSILON {
                failures.push(format!(
                    "expected final speed {} mps, got {} mps",
                    expected,
                    state.speed_mps()
                ));
            }
        }

        if let Some(expected) = self.last_time_to_collision_s {
            match commands.last() {
                Some(last) if (last.time_to_collision_s - expected).abs() <= EPSILON => {}
                Some(last) => failures.push(format!(
                    "expected last time to collision {} s, got {} s",
                    expected, last.time_to_collision_s
                )),
                None => failures.push(format!(
                    "expected last time to collision {} s, but no brake command was issued",
                    expected
                )),
            }
        }

        failures
    }
}
