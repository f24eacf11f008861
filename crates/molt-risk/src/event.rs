//! Detected molt events

use crate::state::MoltState;
use crate::MoltEventError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One detection from the molt observation source.
///
/// Consumed exactly once by the engine; replays of the same id are no-ops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoltEvent {
    pub id: Uuid,
    pub tank_id: String,
    /// Identifier of the observed animal.
    pub subject_id: String,
    pub observed_state: MoltState,
    /// Detection confidence in [0.0, 1.0].
    pub confidence: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// References to supporting evidence (frame captures, clip ids).
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl MoltEvent {
    /// Create a detection with a fresh id and no end time.
    pub fn new(
        tank_id: impl Into<String>,
        subject_id: impl Into<String>,
        observed_state: MoltState,
        confidence: f64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tank_id: tank_id.into(),
            subject_id: subject_id.into(),
            observed_state,
            confidence,
            started_at,
            ended_at: None,
            evidence: Vec::new(),
            note: None,
        }
    }

    /// Reject malformed detections before they can touch engine state.
    pub fn validate(&self) -> Result<(), MoltEventError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(MoltEventError::ConfidenceOutOfRange(self.confidence));
        }
        if let Some(ended_at) = self.ended_at {
            if ended_at < self.started_at {
                return Err(MoltEventError::EndBeforeStart);
            }
        }
        Ok(())
    }

    /// Timestamp used for event-vs-tick precedence: the latest instant the
    /// detection speaks for.
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.ended_at.unwrap_or(self.started_at)
    }
}
