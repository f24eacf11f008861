//! Per-tank molt risk state machine

use crate::config::MoltRiskConfig;
use crate::event::MoltEvent;
use crate::state::{MoltRiskSnapshot, MoltState};
use crate::MoltEventError;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;
use tank_telemetry::{Alert, AlertSeverity};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of feeding one detection into the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum MoltEventOutcome {
    /// Event accepted. `transition` is set when the state actually moved,
    /// and `alert` carries the notification for that move.
    Applied {
        transition: Option<(MoltState, MoltState)>,
        alert: Option<Alert>,
        low_confidence: bool,
    },
    /// Confidence below the detection floor; queued for manual review,
    /// state untouched.
    NeedsReview,
    /// Already-applied event id; no-op.
    Duplicate,
}

/// Result of one wall-clock re-evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum MoltTick {
    Unchanged,
    /// A care-window boundary was crossed.
    Transitioned {
        from: MoltState,
        to: MoltState,
        alert: Alert,
    },
    /// An ecdysis has run past its maximum expected duration without an
    /// end time. Flagged once; does not force a transition.
    EcdysisOverrun {
        open_since: DateTime<Utc>,
        alert: Alert,
    },
}

/// Molt lifecycle state machine, one instance per tank.
///
/// All mutation happens through [`apply_event`](Self::apply_event) and
/// [`tick`](Self::tick); the owning worker serializes calls, so the engine
/// itself needs no locking.
pub struct MoltRiskEngine {
    tank_id: String,
    config: MoltRiskConfig,
    state: MoltState,
    last_transition: DateTime<Utc>,
    /// End of the most recent completed ecdysis; anchor for window math.
    last_ecdysis_end: Option<DateTime<Utc>>,
    /// Start of an ecdysis still in progress.
    active_ecdysis_start: Option<DateTime<Utc>>,
    overrun_flagged: bool,
    /// Newest applied event time; older ticks must not regress state.
    last_event_time: Option<DateTime<Utc>>,
    applied_ids: HashSet<Uuid>,
    review_queue: Vec<MoltEvent>,
}

impl MoltRiskEngine {
    pub fn new(tank_id: impl Into<String>, config: MoltRiskConfig, now: DateTime<Utc>) -> Self {
        let tank_id = tank_id.into();
        info!(tank_id = %tank_id, "creating molt risk engine");
        Self {
            tank_id,
            config,
            state: MoltState::None,
            last_transition: now,
            last_ecdysis_end: None,
            active_ecdysis_start: None,
            overrun_flagged: false,
            last_event_time: None,
            applied_ids: HashSet::new(),
            review_queue: Vec::new(),
        }
    }

    pub fn state(&self) -> MoltState {
        self.state
    }

    pub fn tank_id(&self) -> &str {
        &self.tank_id
    }

    /// Detections awaiting manual review (confidence below the floor).
    pub fn pending_review(&self) -> &[MoltEvent] {
        &self.review_queue
    }

    /// Re-evaluation interval for the current state tier.
    pub fn check_interval(&self) -> Duration {
        if self.state.is_critical_tier() {
            self.config.critical_check_interval()
        } else {
            self.config.standard_check_interval()
        }
    }

    /// Apply a detected molt event.
    ///
    /// Malformed events are rejected and leave the engine in its last valid
    /// state. Replays of an already-consumed id are no-ops.
    pub fn apply_event(
        &mut self,
        event: MoltEvent,
        now: DateTime<Utc>,
    ) -> Result<MoltEventOutcome, MoltEventError> {
        event.validate()?;
        if event.tank_id != self.tank_id {
            return Err(MoltEventError::TankMismatch {
                event_tank: event.tank_id,
                engine_tank: self.tank_id.clone(),
            });
        }

        if self.applied_ids.contains(&event.id) {
            debug!(tank_id = %self.tank_id, event_id = %event.id, "duplicate molt event ignored");
            return Ok(MoltEventOutcome::Duplicate);
        }
        self.applied_ids.insert(event.id);

        if event.confidence < self.config.min_detection_confidence {
            warn!(
                tank_id = %self.tank_id,
                event_id = %event.id,
                confidence = event.confidence,
                "low-confidence detection queued for review"
            );
            self.review_queue.push(event);
            return Ok(MoltEventOutcome::NeedsReview);
        }

        let low_confidence = event.confidence < self.config.high_confidence_threshold;
        let from = self.state;
        let subject = event.subject_id.clone();

        let to = match event.observed_state {
            MoltState::Ecdysis => {
                if let Some(end) = event.ended_at {
                    // Completed molt: anchor the recovery windows on its end.
                    self.last_ecdysis_end = Some(end);
                    self.active_ecdysis_start = None;
                    self.overrun_flagged = false;
                    self.window_state(now - end)
                } else {
                    self.active_ecdysis_start = Some(event.started_at);
                    self.overrun_flagged = false;
                    MoltState::Ecdysis
                }
            }
            MoltState::Premolt | MoltState::None => {
                // A new cycle (or an explicit all-clear) invalidates the
                // previous cycle's anchor.
                self.last_ecdysis_end = None;
                self.active_ecdysis_start = None;
                self.overrun_flagged = false;
                event.observed_state
            }
            observed => observed,
        };

        let event_time = event.effective_time();
        self.last_event_time = Some(match self.last_event_time {
            Some(t) => t.max(event_time),
            None => event_time,
        });

        let transition = (from != to).then_some((from, to));
        let alert = transition.map(|(_, to)| {
            self.state = to;
            self.last_transition = now;
            info!(
                tank_id = %self.tank_id,
                from = from.key(),
                to = to.key(),
                confidence = event.confidence,
                "molt state transition from detection"
            );
            self.transition_alert(to, Some(&subject), low_confidence, now)
        });
        if transition.is_none() {
            debug!(
                tank_id = %self.tank_id,
                state = self.state.key(),
                "detection confirmed current state"
            );
        }

        Ok(MoltEventOutcome::Applied {
            transition,
            alert,
            low_confidence,
        })
    }

    /// Advance the engine on a wall-clock tick.
    pub fn tick(&mut self, now: DateTime<Utc>) -> MoltTick {
        // A tick older than the newest detection must not regress state.
        if let Some(event_time) = self.last_event_time {
            if now < event_time {
                debug!(tank_id = %self.tank_id, "stale tick ignored");
                return MoltTick::Unchanged;
            }
        }

        if self.state == MoltState::Ecdysis && !self.overrun_flagged {
            if let Some(start) = self.active_ecdysis_start {
                if now - start > self.config.max_ecdysis_duration() {
                    self.overrun_flagged = true;
                    warn!(
                        tank_id = %self.tank_id,
                        open_hours = (now - start).num_hours(),
                        "ecdysis exceeded maximum expected duration"
                    );
                    let alert = Alert {
                        id: format!(
                            "{}:molt:ecdysis_overrun:{}",
                            self.tank_id,
                            start.timestamp()
                        ),
                        tank_id: self.tank_id.clone(),
                        parameter: "Molt".to_string(),
                        severity: AlertSeverity::Critical,
                        message: format!(
                            "Ecdysis open for {} h, past the {} h maximum; manual check advised",
                            (now - start).num_hours(),
                            self.config.max_ecdysis_duration().num_hours(),
                        ),
                        timestamp: now,
                    };
                    return MoltTick::EcdysisOverrun {
                        open_since: start,
                        alert,
                    };
                }
            }
        }

        if matches!(self.state, MoltState::PostmoltRisk | MoltState::PostmoltSafe) {
            if let Some(end) = self.last_ecdysis_end {
                let target = self.window_state(now - end);
                if target != self.state {
                    let from = self.state;
                    self.state = target;
                    self.last_transition = now;
                    if target == MoltState::None {
                        self.last_ecdysis_end = None;
                    }
                    info!(
                        tank_id = %self.tank_id,
                        from = from.key(),
                        to = target.key(),
                        "molt window boundary crossed"
                    );
                    let alert = self.transition_alert(target, None, false, now);
                    return MoltTick::Transitioned {
                        from,
                        to: target,
                        alert,
                    };
                }
            }
        }

        MoltTick::Unchanged
    }

    /// Current derived risk for the tank.
    pub fn snapshot(&self, now: DateTime<Utc>) -> MoltRiskSnapshot {
        MoltRiskSnapshot {
            tank_id: self.tank_id.clone(),
            state: self.state,
            severity: self.state.risk_severity(),
            remaining_window: self.remaining_window(now),
            last_transition: self.last_transition,
        }
    }

    /// Time left until the current care-window boundary, clamped at zero.
    fn remaining_window(&self, now: DateTime<Utc>) -> Option<Duration> {
        let end = self.last_ecdysis_end?;
        let boundary = match self.state {
            MoltState::PostmoltRisk => end + self.config.high_risk_window(),
            MoltState::PostmoltSafe => end + self.config.post_molt_window(),
            _ => return None,
        };
        Some((boundary - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// State implied by time elapsed since the last ecdysis end.
    fn window_state(&self, elapsed: chrono::Duration) -> MoltState {
        if elapsed < self.config.high_risk_window() {
            MoltState::PostmoltRisk
        } else if elapsed < self.config.post_molt_window() {
            MoltState::PostmoltSafe
        } else {
            MoltState::None
        }
    }

    fn transition_alert(
        &self,
        to: MoltState,
        subject: Option<&str>,
        low_confidence: bool,
        now: DateTime<Utc>,
    ) -> Alert {
        // Occurrence identity: the cycle anchor when one is known,
        // otherwise the observed subject.
        let tag = match self.last_ecdysis_end {
            Some(end) => end.timestamp().to_string(),
            None => subject.unwrap_or("tank").to_string(),
        };

        let mut message = match to {
            MoltState::Premolt => match subject {
                Some(s) => format!("Premolt signs detected for {}", s),
                None => "Premolt signs detected".to_string(),
            },
            MoltState::Ecdysis => match subject {
                Some(s) => format!("Ecdysis underway for {}", s),
                None => "Ecdysis underway".to_string(),
            },
            MoltState::PostmoltRisk => format!(
                "Post-molt high-risk window active for the next {} h",
                self.config.high_risk_window().num_hours()
            ),
            MoltState::PostmoltSafe => "Post-molt recovery continuing; shell hardening".to_string(),
            MoltState::None => "Molt cycle complete".to_string(),
        };
        if low_confidence {
            message.push_str(" (low-confidence detection)");
        }

        Alert {
            id: format!("{}:molt:{}:{}", self.tank_id, to.key(), tag),
            tank_id: self.tank_id.clone(),
            parameter: "Molt".to_string(),
            severity: to.risk_severity(),
            message,
            timestamp: now,
        }
    }
}
