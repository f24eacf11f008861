//! Notifier boundary

use tank_telemetry::{Alert, WaterParameter};
use thiserror::Error;
use tracing::info;

/// Notifier-side dispatch failures.
///
/// Both variants are tolerated by the dispatcher: logged, counted, and never
/// retried in-line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotifyError {
    #[error("Notification permission denied: {0}")]
    PermissionDenied(String),

    #[error("Notifier unavailable: {0}")]
    Unavailable(String),
}

/// Side-effecting notification sink.
///
/// One notification slot per parameter and tank; `clear` releases a single
/// slot, `clear_all` releases every slot for a tank.
pub trait Notifier: Send + Sync {
    fn show(&self, alert: &Alert) -> Result<(), NotifyError>;

    fn clear(&self, parameter: WaterParameter, tank_id: &str) -> Result<(), NotifyError>;

    fn clear_all(&self, tank_id: &str) -> Result<(), NotifyError>;
}

/// Notifier that writes to the log. Used for wiring and demos.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, alert: &Alert) -> Result<(), NotifyError> {
        info!(
            "[{}] {} alert on {}: {}",
            alert.tank_id, alert.severity, alert.parameter, alert.message
        );
        Ok(())
    }

    fn clear(&self, parameter: WaterParameter, tank_id: &str) -> Result<(), NotifyError> {
        info!("[{}] cleared {} notification", tank_id, parameter.label());
        Ok(())
    }

    fn clear_all(&self, tank_id: &str) -> Result<(), NotifyError> {
        info!("[{}] cleared all notifications", tank_id);
        Ok(())
    }
}
