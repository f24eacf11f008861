//! Molt risk configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Molt risk engine configuration.
///
/// Window invariant: `post_molt_window_secs` is the total recovery window,
/// of which the first `high_risk_window_secs` is the high-risk portion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoltRiskConfig {
    /// Detections below this confidence are queued for manual review
    /// instead of being applied.
    pub min_detection_confidence: f64,

    /// Detections at or above this confidence are applied without
    /// annotation; between the two thresholds the resulting alert is
    /// marked as a low-confidence detection.
    pub high_confidence_threshold: f64,

    /// High-risk portion of the post-molt window (seconds).
    pub high_risk_window_secs: u64,

    /// Total post-molt window (seconds), high-risk portion included.
    pub post_molt_window_secs: u64,

    /// An ecdysis event still open after this long is flagged as an anomaly.
    pub max_ecdysis_duration_secs: u64,

    /// Re-evaluation interval while in a standard-tier state (seconds).
    pub standard_check_interval_secs: u64,

    /// Re-evaluation interval while in a critical-tier state (seconds).
    pub critical_check_interval_secs: u64,
}

impl Default for MoltRiskConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.5,
            high_confidence_threshold: 0.85,
            high_risk_window_secs: 6 * 3600,
            post_molt_window_secs: 72 * 3600,
            max_ecdysis_duration_secs: 8 * 3600,
            standard_check_interval_secs: 300,
            critical_check_interval_secs: 60,
        }
    }
}

impl MoltRiskConfig {
    /// Strict preset: longer care windows, more eager checks.
    pub fn strict() -> Self {
        Self {
            high_risk_window_secs: 12 * 3600,
            post_molt_window_secs: 96 * 3600,
            standard_check_interval_secs: 120,
            critical_check_interval_secs: 30,
            ..Default::default()
        }
    }

    /// Lenient preset: shorter windows, relaxed checks.
    pub fn lenient() -> Self {
        Self {
            high_risk_window_secs: 4 * 3600,
            post_molt_window_secs: 48 * 3600,
            standard_check_interval_secs: 600,
            critical_check_interval_secs: 120,
            ..Default::default()
        }
    }

    pub fn high_risk_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.high_risk_window_secs as i64)
    }

    pub fn post_molt_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.post_molt_window_secs as i64)
    }

    pub fn max_ecdysis_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_ecdysis_duration_secs as i64)
    }

    pub fn standard_check_interval(&self) -> Duration {
        Duration::from_secs(self.standard_check_interval_secs)
    }

    pub fn critical_check_interval(&self) -> Duration {
        Duration::from_secs(self.critical_check_interval_secs)
    }
}
