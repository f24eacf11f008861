//! External input boundaries

use molt_risk::MoltEvent;
use tank_telemetry::{Reading, TelemetryError, Thresholds};
use tokio::sync::{mpsc, watch};

use crate::MonitorError;

/// Stream of water-quality readings for a tank. Delivery is best-effort.
pub trait TelemetrySource {
    fn subscribe(&mut self) -> Result<mpsc::Receiver<Reading>, MonitorError>;
}

/// Stream of molt detections for a tank. May stay silent for long periods.
pub trait MoltObservationSource {
    fn subscribe(&mut self) -> Result<mpsc::Receiver<MoltEvent>, MonitorError>;
}

/// Current thresholds for a tank, observable for changes.
pub trait ThresholdsStore {
    fn current(&self) -> Thresholds;
    fn watch(&self) -> watch::Receiver<Thresholds>;
}

/// Channel-backed telemetry source for wiring and tests.
pub struct ChannelTelemetrySource {
    tx: mpsc::Sender<Reading>,
    rx: Option<mpsc::Receiver<Reading>>,
}

impl ChannelTelemetrySource {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self { tx, rx: Some(rx) }
    }

    /// Handle used by the producing side.
    pub fn sender(&self) -> mpsc::Sender<Reading> {
        self.tx.clone()
    }
}

impl TelemetrySource for ChannelTelemetrySource {
    fn subscribe(&mut self) -> Result<mpsc::Receiver<Reading>, MonitorError> {
        self.rx
            .take()
            .ok_or(MonitorError::AlreadySubscribed("telemetry"))
    }
}

/// Channel-backed molt observation source for wiring and tests.
pub struct ChannelMoltObservationSource {
    tx: mpsc::Sender<MoltEvent>,
    rx: Option<mpsc::Receiver<MoltEvent>>,
}

impl ChannelMoltObservationSource {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self { tx, rx: Some(rx) }
    }

    pub fn sender(&self) -> mpsc::Sender<MoltEvent> {
        self.tx.clone()
    }
}

impl MoltObservationSource for ChannelMoltObservationSource {
    fn subscribe(&mut self) -> Result<mpsc::Receiver<MoltEvent>, MonitorError> {
        self.rx
            .take()
            .ok_or(MonitorError::AlreadySubscribed("molt observation"))
    }
}

/// Thresholds held in a watch slot; readers always see the latest value.
pub struct SharedThresholdsStore {
    tx: watch::Sender<Thresholds>,
}

impl SharedThresholdsStore {
    /// Invalid ranges are rejected before they can reach evaluation.
    pub fn new(thresholds: Thresholds) -> Result<Self, TelemetryError> {
        thresholds.validate()?;
        let (tx, _rx) = watch::channel(thresholds);
        Ok(Self { tx })
    }

    /// Replace the active thresholds.
    pub fn update(&self, thresholds: Thresholds) -> Result<(), TelemetryError> {
        thresholds.validate()?;
        self.tx.send_replace(thresholds);
        Ok(())
    }
}

impl ThresholdsStore for SharedThresholdsStore {
    fn current(&self) -> Thresholds {
        self.tx.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Thresholds> {
        self.tx.subscribe()
    }
}
