//! Automatic Emergency Braking (AEB)
//!
//! Turns bus telemetry into brake commands using two policies:
//! - Speed limit compliance (brake when over the last known limit)
//! - Forward collision urgency (brake when time-to-collision is inside the threshold)

pub mod config;
pub mod controller;
pub mod error;
pub mod state;

pub use self::config::AutoBrakeConfig;
pub use controller::AutoBrake;
pub use error::AutoBrakeError;
pub use state::BrakeState;

/// Default collision threshold (seconds)
pub const DEFAULT_COLLISION_THRESHOLD_S: f64 = 5.0;

/// Speed limit assumed until a sign is recognized (m/s)
pub const DEFAULT_SPEED_LIMIT_MPS: u32 = 39;

/// Lowest accepted collision threshold (seconds)
pub const MIN_COLLISION_THRESHOLD_S: f64 = 1.0;
