//! Molt lifecycle states and derived snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tank_telemetry::AlertSeverity;

/// Molt lifecycle state.
///
/// Linear forward cycle with a single branch back to `None`:
/// `None -> Premolt -> Ecdysis -> PostmoltRisk -> PostmoltSafe -> None`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoltState {
    #[default]
    None,
    Premolt,
    Ecdysis,
    PostmoltRisk,
    PostmoltSafe,
}

impl MoltState {
    /// Stable key used in alert identities and logs.
    pub fn key(&self) -> &'static str {
        match self {
            MoltState::None => "none",
            MoltState::Premolt => "premolt",
            MoltState::Ecdysis => "ecdysis",
            MoltState::PostmoltRisk => "postmolt_risk",
            MoltState::PostmoltSafe => "postmolt_safe",
        }
    }

    /// Risk severity implied by the state.
    pub fn risk_severity(&self) -> AlertSeverity {
        match self {
            MoltState::Ecdysis | MoltState::PostmoltRisk => AlertSeverity::Critical,
            MoltState::Premolt | MoltState::PostmoltSafe => AlertSeverity::Warning,
            MoltState::None => AlertSeverity::Info,
        }
    }

    /// States that require the shorter re-evaluation interval.
    pub fn is_critical_tier(&self) -> bool {
        matches!(self, MoltState::Ecdysis | MoltState::PostmoltRisk)
    }
}

/// Current molt risk for a tank, re-derived on every event or tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoltRiskSnapshot {
    pub tank_id: String,
    pub state: MoltState,
    pub severity: AlertSeverity,
    /// Time left in the current care window. `None` while no ecdysis end
    /// time is known or the cycle is over.
    pub remaining_window: Option<Duration>,
    pub last_transition: DateTime<Utc>,
}
