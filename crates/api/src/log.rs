//! In-memory alert log

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tank_telemetry::{Alert, AlertSeverity};
use tracing::info;

/// Bounded in-memory record of dispatched alerts, newest last.
///
/// Retention is the only persistence this process keeps; durable history
/// belongs to an external store.
pub struct AlertLog {
    entries: Mutex<VecDeque<Alert>>,
    max_entries: usize,
}

impl AlertLog {
    pub fn new(max_entries: usize) -> Self {
        info!("Creating in-memory alert log ({} entries)", max_entries);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max_entries.min(1024))),
            max_entries,
        }
    }

    /// Append a dispatched alert, evicting the oldest at capacity.
    pub fn record(&self, alert: Alert) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(alert);
    }

    /// Most recent alerts first, optionally filtered.
    pub fn recent(
        &self,
        limit: usize,
        severity: Option<AlertSeverity>,
        tank_id: Option<&str>,
    ) -> Vec<Alert> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .rev()
            .filter(|alert| severity.map_or(true, |s| alert.severity == s))
            .filter(|alert| tank_id.map_or(true, |t| alert.tank_id == t))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
