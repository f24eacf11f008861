//! Telemetry Error Types

use thiserror::Error;

/// Errors in telemetry configuration.
#[derive(Debug, Clone, Error)]
pub enum TelemetryError {
    /// Threshold range with min above max
    #[error("{parameter} threshold range is inverted: min {min} > max {max}")]
    InvalidRange {
        parameter: &'static str,
        min: f64,
        max: f64,
    },
}
