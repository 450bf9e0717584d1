//! AutoBrake configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::AutoBrakeError;
use crate::state::check_collision_threshold;
use crate::{DEFAULT_COLLISION_THRESHOLD_S, DEFAULT_SPEED_LIMIT_MPS};

/// Environment variable prefix (`AUTOBRAKE_COLLISION_THRESHOLD_S`, ...)
pub const ENV_PREFIX: &str = "AUTOBRAKE";

/// AutoBrake configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoBrakeConfig {
    /// Collision threshold (seconds, >= 1)
    pub collision_threshold_s: f64,

    /// Speed limit assumed before any sign is recognized (m/s)
    pub initial_speed_limit_mps: u32,
}

impl Default for AutoBrakeConfig {
    fn default() -> Self {
        Self {
            collision_threshold_s: DEFAULT_COLLISION_THRESHOLD_S,
            initial_speed_limit_mps: DEFAULT_SPEED_LIMIT_MPS,
        }
    }
}

impl AutoBrakeConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<(), AutoBrakeError> {
        check_collision_threshold(self.collision_threshold_s)
    }

    /// Load configuration: built-in defaults, then the optional file, then
    /// `AUTOBRAKE_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, AutoBrakeError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true),
        );

        let loaded: Self = builder.build()?.try_deserialize()?;
        loaded.validate()?;

        info!(
            collision_threshold_s = loaded.collision_threshold_s,
            initial_speed_limit_mps = loaded.initial_speed_limit_mps,
            "AutoBrake configuration loaded"
        );
        Ok(loaded)
    }
}
