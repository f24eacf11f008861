//! Alert dispatcher implementation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

use tank_telemetry::{Alert, AlertSeverity, WaterParameter};

use crate::notifier::{Notifier, NotifyError};

/// Cooldown accounting scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownScope {
    /// One shared clock for every notification.
    #[default]
    Global,
    /// One clock per (tank, parameter) slot.
    PerParameter,
}

/// Dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Cooldown period between non-critical notifications (seconds)
    pub cooldown_seconds: u64,
    /// Maximum remembered alert ids before the oldest is evicted
    pub dedup_capacity: usize,
    pub cooldown_scope: CooldownScope,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 300, // 5 minutes
            dedup_capacity: 256,
            cooldown_scope: CooldownScope::Global,
        }
    }
}

impl DispatchConfig {
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_seconds as i64)
    }
}

/// Outcome of one alert within a submitted batch.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Forwarded to the notifier and recorded in the notified-set.
    Notified { alert: Alert },
    /// Id already notified; skipped.
    Duplicate { id: String },
    /// Held back by the cooldown. Nothing is recorded, so the next batch
    /// re-attempts naturally.
    Deferred { id: String },
    /// Notifier rejected the alert. Not recorded, never retried in-line.
    Failed { id: String, error: NotifyError },
}

/// Running dispatch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub notified: u64,
    pub duplicates: u64,
    pub deferred: u64,
    pub failures: u64,
}

/// Dedup and cooldown gate in front of the notifier.
///
/// Owned by a single worker; all mutation goes through `submit_at`,
/// `resolve`, and `reset`.
pub struct AlertDispatcher {
    config: DispatchConfig,
    notifier: Arc<dyn Notifier>,
    /// Membership test for the notified-set.
    notified: HashSet<String>,
    /// Insertion order for capacity eviction, oldest first.
    notified_order: VecDeque<String>,
    /// Last notification time per cooldown key.
    cooldowns: HashMap<String, DateTime<Utc>>,
    stats: DispatchStats,
}

impl AlertDispatcher {
    pub fn new(config: DispatchConfig, notifier: Arc<dyn Notifier>) -> Self {
        info!("Creating alert dispatcher with config: {:?}", config);
        Self {
            config,
            notifier,
            notified: HashSet::new(),
            notified_order: VecDeque::new(),
            cooldowns: HashMap::new(),
            stats: DispatchStats::default(),
        }
    }

    /// Process a batch at the current instant.
    pub fn submit(&mut self, alerts: Vec<Alert>) -> Vec<DispatchOutcome> {
        self.submit_at(alerts, Utc::now())
    }

    /// Process a batch at an explicit instant, highest severity first.
    ///
    /// The sort is stable, so alerts of equal severity keep arrival order.
    pub fn submit_at(&mut self, mut alerts: Vec<Alert>, now: DateTime<Utc>) -> Vec<DispatchOutcome> {
        alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
        alerts
            .into_iter()
            .map(|alert| self.dispatch(alert, now))
            .collect()
    }

    fn dispatch(&mut self, alert: Alert, now: DateTime<Utc>) -> DispatchOutcome {
        if self.notified.contains(&alert.id) {
            debug!("Alert suppressed: id {} already notified", alert.id);
            self.stats.duplicates += 1;
            return DispatchOutcome::Duplicate { id: alert.id };
        }

        let key = self.cooldown_key(&alert);
        if alert.severity < AlertSeverity::Critical {
            if let Some(last) = self.cooldowns.get(&key) {
                if now - *last < self.config.cooldown() {
                    debug!("Alert deferred: {} in cooldown for {}", alert.id, key);
                    self.stats.deferred += 1;
                    return DispatchOutcome::Deferred { id: alert.id };
                }
            }
        }

        match self.notifier.show(&alert) {
            Ok(()) => {
                info!(
                    "Alert notified: {} [{}] {}",
                    alert.id, alert.severity, alert.message
                );
                self.record(alert.id.clone(), key, now);
                DispatchOutcome::Notified { alert }
            }
            Err(error) => {
                warn!("Notifier rejected alert {}: {}", alert.id, error);
                self.stats.failures += 1;
                DispatchOutcome::Failed {
                    id: alert.id,
                    error,
                }
            }
        }
    }

    fn cooldown_key(&self, alert: &Alert) -> String {
        match self.config.cooldown_scope {
            CooldownScope::Global => "global".to_string(),
            CooldownScope::PerParameter => format!("{}:{}", alert.tank_id, alert.parameter),
        }
    }

    fn record(&mut self, id: String, key: String, now: DateTime<Utc>) {
        if self.notified.insert(id.clone()) {
            self.notified_order.push_back(id);
            if self.notified_order.len() > self.config.dedup_capacity {
                if let Some(oldest) = self.notified_order.pop_front() {
                    self.notified.remove(&oldest);
                }
            }
        }
        self.cooldowns.insert(key, now);
        self.stats.notified += 1;
    }

    /// Clear a resolved parameter's notification slot and forget its id.
    pub fn resolve(&mut self, parameter: WaterParameter, tank_id: &str) {
        let id = Alert::threshold_id(tank_id, parameter);
        if self.notified.remove(&id) {
            self.notified_order.retain(|known| known != &id);
            info!("Alert resolved: {}", id);
        }
        if let Err(error) = self.notifier.clear(parameter, tank_id) {
            warn!("Notifier failed to clear {}: {}", id, error);
        }
    }

    /// Drop all dedup and cooldown state.
    pub fn reset(&mut self) {
        self.notified.clear();
        self.notified_order.clear();
        self.cooldowns.clear();
    }

    /// Session teardown: release every slot for the tank, then reset.
    pub fn shutdown(&mut self, tank_id: &str) {
        if let Err(error) = self.notifier.clear_all(tank_id) {
            warn!("Notifier failed to clear tank {}: {}", tank_id, error);
        }
        self.reset();
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn notified_count(&self) -> usize {
        self.notified.len()
    }
}
