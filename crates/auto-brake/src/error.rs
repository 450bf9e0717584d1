//! AutoBrake Error Types

use thiserror::Error;

/// Errors raised by the braking controller and its configuration
#[derive(Debug, Error)]
pub enum AutoBrakeError {
    /// Value below the accepted minimum; previous value is kept
    #[error("{field} value {value} is out of range (must be >= {min})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
    },

    /// Configuration source could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
