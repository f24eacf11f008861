//! Alerts and severity scale

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reading::WaterParameter;

/// Alert severity, ordered low to high.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified violation at a point in time.
///
/// Two alerts with the same id represent the same occurrence and must not
/// be notified twice. Threshold alert ids are stable per (tank, parameter)
/// and released when the violation resolves; molt alert ids are scoped to
/// the molt cycle they belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub tank_id: String,
    /// Parameter name, or the lifecycle slot for molt alerts.
    pub parameter: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    /// Stable identity of a threshold violation for a (tank, parameter) pair.
    pub fn threshold_id(tank_id: &str, parameter: WaterParameter) -> String {
        format!("{}:{}", tank_id, parameter.key())
    }

    /// Build a threshold violation alert.
    pub fn threshold(
        tank_id: &str,
        parameter: WaterParameter,
        severity: AlertSeverity,
        message: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::threshold_id(tank_id, parameter),
            tank_id: tank_id.to_string(),
            parameter: parameter.label().to_string(),
            severity,
            message,
            timestamp,
        }
    }
}
