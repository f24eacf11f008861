//! Alert Dispatch
//!
//! Dedup and cooldown gate between alert producers and the operator-facing
//! notifier:
//! - Severity-ordered batch processing, critical alerts exempt from cooldown
//! - Bounded notified-set with oldest-first eviction
//! - Explicit resolve/reset transitions for cleared conditions

pub mod dispatcher;
pub mod notifier;

pub use dispatcher::{
    AlertDispatcher, CooldownScope, DispatchConfig, DispatchOutcome, DispatchStats,
};
pub use notifier::{LogNotifier, Notifier, NotifyError};
