//! Tank Monitor
//!
//! One logical worker per tank: merges telemetry readings, molt detections,
//! and an adaptive wall-clock tick into a single sequential update stream,
//! then publishes alerts, a risk snapshot, and a per-parameter severity map.

pub mod sources;
pub mod worker;

pub use sources::{
    ChannelMoltObservationSource, ChannelTelemetrySource, MoltObservationSource,
    SharedThresholdsStore, TelemetrySource, ThresholdsStore,
};
pub use worker::{MonitorConfig, MonitorHandle, SeverityMap, TankMonitor};

use thiserror::Error;

/// Monitor wiring failures.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("{0} source already subscribed")]
    AlreadySubscribed(&'static str),
}
