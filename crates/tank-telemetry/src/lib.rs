//! Tank Telemetry Data Model
//!
//! Shared types for the monitoring pipeline:
//! - Water-quality readings and the fixed parameter set
//! - Per-tank threshold configuration with validation
//! - Alerts and the ordered severity scale

mod alert;
mod error;
mod reading;
mod thresholds;

pub use alert::{Alert, AlertSeverity};
pub use error::TelemetryError;
pub use reading::{Reading, WaterParameter};
pub use thresholds::{ParameterRange, Thresholds};
