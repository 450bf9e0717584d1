//! Bus message types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ego vehicle speed, published whenever it changes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeedUpdate {
    /// Current speed (m/s)
    pub velocity_mps: f64,
}

/// Forward obstacle detected by the perception stack
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CarDetected {
    /// Distance to the obstacle (meters)
    pub distance_m: f64,
    /// Closing velocity relative to the ego vehicle (m/s)
    pub velocity_mps: f64,
}

/// Newly recognized posted speed limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpeedLimitDetected {
    /// Posted limit (m/s)
    pub speed_mps: u32,
}

/// Instruction for the braking actuator to engage
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BrakeCommand {
    /// Computed urgency; zero for speed-limit violations
    pub time_to_collision_s: f64,
}

impl BrakeCommand {
    /// Brake immediately (speed-limit violation)
    pub fn immediate() -> Self {
        Self {
            time_to_collision_s: 0.0,
        }
    }
}

/// Inbound event delivered to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    SpeedUpdate(SpeedUpdate),
    CarDetected(CarDetected),
    SpeedLimitDetected(SpeedLimitDetected),
}

impl BusEvent {
    /// Channel this event is delivered on
    pub fn kind(&self) -> BusEventKind {
        match self {
            BusEvent::SpeedUpdate(_) => BusEventKind::SpeedUpdate,
            BusEvent::CarDetected(_) => BusEventKind::CarDetected,
            BusEvent::SpeedLimitDetected(_) => BusEventKind::SpeedLimitDetected,
        }
    }
}

impl From<SpeedUpdate> for BusEvent {
    fn from(update: SpeedUpdate) -> Self {
        BusEvent::SpeedUpdate(update)
    }
}

impl From<CarDetected> for BusEvent {
    fn from(detected: CarDetected) -> Self {
        BusEvent::CarDetected(detected)
    }
}

impl From<SpeedLimitDetected> for BusEvent {
    fn from(limit: SpeedLimitDetected) -> Self {
        BusEvent::SpeedLimitDetected(limit)
    }
}

/// Inbound channel tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusEventKind {
    SpeedUpdate,
    CarDetected,
    SpeedLimitDetected,
}

impl fmt::Display for BusEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BusEventKind::SpeedUpdate => "speed_update",
            BusEventKind::CarDetected => "car_detected",
            BusEventKind::SpeedLimitDetected => "speed_limit_detected",
        };
        f.write_str(name)
    }
}
