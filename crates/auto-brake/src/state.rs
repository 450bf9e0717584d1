//! Controller state and braking policies

use brake_bus::{BrakeCommand, CarDetected, SpeedLimitDetected, SpeedUpdate};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use crate::error::AutoBrakeError;
use crate::{DEFAULT_COLLISION_THRESHOLD_S, DEFAULT_SPEED_LIMIT_MPS, MIN_COLLISION_THRESHOLD_S};

/// Braking controller state.
///
/// Each `on_*` transition yields at most one brake command; publishing it is
/// left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BrakeState {
    /// Time-to-collision at or below which the collision policy brakes (s)
    collision_threshold_s: f64,
    /// Last accepted ego speed (m/s)
    speed_mps: f64,
    /// Last recognized speed limit (m/s)
    last_known_speed_limit: u32,
}

impl Default for BrakeState {
    fn default() -> Self {
        Self {
            collision_threshold_s: DEFAULT_COLLISION_THRESHOLD_S,
            speed_mps: 0.0,
            last_known_speed_limit: DEFAULT_SPEED_LIMIT_MPS,
        }
    }
}

impl BrakeState {
    /// Create a stationary state with the given threshold and speed limit
    pub fn new(collision_threshold_s: f64, speed_limit_mps: u32) -> Result<Self, AutoBrakeError> {
        let mut state = Self {
            last_known_speed_limit: speed_limit_mps,
            ..Self::default()
        };
        state.set_collision_threshold_s(collision_threshold_s)?;
        Ok(state)
    }

    pub fn collision_threshold_s(&self) -> f64 {
        self.collision_threshold_s
    }

    pub fn speed_mps(&self) -> f64 {
        self.speed_mps
    }

    pub fn last_known_speed_limit(&self) -> u32 {
        self.last_known_speed_limit
    }

    /// Commit a new collision threshold, or leave the old one on error
    pub fn set_collision_threshold_s(&mut self, threshold_s: f64) -> Result<(), AutoBrakeError> {
        check_collision_threshold(threshold_s)?;
        self.collision_threshold_s = threshold_s;
        Ok(())
    }

    /// Speed limit policy for a new ego speed
    pub fn on_speed_update(&mut self, update: &SpeedUpdate) -> Option<BrakeCommand> {
        if update.velocity_mps > f64::from(self.last_known_speed_limit) {
            debug!(
                velocity_mps = update.velocity_mps,
                limit_mps = self.last_known_speed_limit,
                "Speed above limit, not stored"
            );
            return Some(BrakeCommand::immediate());
        }

        self.speed_mps = update.velocity_mps;
        debug!(speed_mps = self.speed_mps, "Speed updated");
        None
    }

    /// Collision policy for a detected car
    pub fn on_car_detected(&self, detected: &CarDetected) -> Option<BrakeCommand> {
        // Closing speed is the stored ego speed; the event's velocity is ignored.
        let time_to_collision_s = detected.distance_m / self.speed_mps;
        debug!(
            distance_m = detected.distance_m,
            time_to_collision_s,
            threshold_s = self.collision_threshold_s,
            "Car detected"
        );

        // NaN and infinities (stationary ego vehicle) fall outside the window.
        if time_to_collision_s > 0.0 && time_to_collision_s <= self.collision_threshold_s {
            Some(BrakeCommand { time_to_collision_s })
        } else {
            None
        }
    }

    /// Speed limit policy for a new posted limit
    pub fn on_speed_limit(&mut self, limit: &SpeedLimitDetected) -> Option<BrakeCommand> {
        self.last_known_speed_limit = limit.speed_mps;
        debug!(limit_mps = limit.speed_mps, "Speed limit updated");

        if self.speed_mps > f64::from(self.last_known_speed_limit) {
            Some(BrakeCommand::immediate())
        } else {
            None
        }
    }
}

impl fmt::Display for BrakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Collision threshold: {} s", self.collision_threshold_s)?;
        writeln!(f, "Speed: {} mps", self.speed_mps)?;
        write!(f, "Speed limit: {} mps", self.last_known_speed_limit)
    }
}

/// Reject thresholds below the minimum (NaN included)
pub(crate) fn check_collision_threshold(threshold_s: f64) -> Result<(), AutoBrakeError> {
    if threshold_s >= MIN_COLLISION_THRESHOLD_S {
        Ok(())
    } else {
        warn!(threshold_s, "Collision threshold rejected");
        Err(AutoBrakeError::OutOfRange {
            field: "collision_threshold_s",
            value: threshold_s,
            min: MIN_COLLISION_THRESHOLD_S,
        })
    }
}
