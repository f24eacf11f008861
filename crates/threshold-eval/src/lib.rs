//! Threshold Evaluator
//!
//! Pure rule evaluation of a reading against per-tank thresholds.
//! Produces zero or more classified alerts; never fails.

mod evaluator;

pub use evaluator::{evaluate, evaluate_all, violations};
