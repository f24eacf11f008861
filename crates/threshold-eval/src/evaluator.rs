//! Rule table and evaluation

use chrono::{DateTime, Utc};
use tank_telemetry::{Alert, AlertSeverity, ParameterRange, Reading, Thresholds, WaterParameter};
use tracing::debug;

/// Which bounds a parameter's rule checks.
#[derive(Debug, Clone, Copy)]
struct Rule {
    checks_min: bool,
    checks_max: bool,
    severity: AlertSeverity,
}

/// Fixed rule per parameter. Severity does not escalate with magnitude.
fn rule(parameter: WaterParameter) -> Rule {
    match parameter {
        WaterParameter::Ph => Rule {
            checks_min: true,
            checks_max: true,
            severity: AlertSeverity::Warning,
        },
        WaterParameter::DissolvedOxygen => Rule {
            checks_min: true,
            checks_max: false,
            severity: AlertSeverity::Critical,
        },
        WaterParameter::Salinity => Rule {
            checks_min: true,
            checks_max: true,
            severity: AlertSeverity::Warning,
        },
        WaterParameter::Ammonia => Rule {
            checks_min: false,
            checks_max: true,
            severity: AlertSeverity::Critical,
        },
        WaterParameter::Temperature => Rule {
            checks_min: true,
            checks_max: true,
            severity: AlertSeverity::Warning,
        },
        WaterParameter::WaterLevel => Rule {
            checks_min: true,
            checks_max: true,
            severity: AlertSeverity::Warning,
        },
        WaterParameter::TotalDissolvedSolids => Rule {
            checks_min: true,
            checks_max: true,
            severity: AlertSeverity::Warning,
        },
        WaterParameter::Turbidity => Rule {
            checks_min: false,
            checks_max: true,
            severity: AlertSeverity::Warning,
        },
    }
}

fn quantity(parameter: WaterParameter, value: f64) -> String {
    let unit = parameter.unit();
    if unit.is_empty() {
        format!("{:.2}", value)
    } else {
        format!("{:.2} {}", value, unit)
    }
}

fn check(
    parameter: WaterParameter,
    value: f64,
    range: ParameterRange,
    tank_id: &str,
    timestamp: DateTime<Utc>,
) -> Option<Alert> {
    let rule = rule(parameter);

    if rule.checks_min {
        if let Some(min) = range.min {
            if value < min {
                let message = format!(
                    "{} {} below minimum {}",
                    parameter.label(),
                    quantity(parameter, value),
                    quantity(parameter, min),
                );
                return Some(Alert::threshold(
                    tank_id,
                    parameter,
                    rule.severity,
                    message,
                    timestamp,
                ));
            }
        }
    }

    if rule.checks_max {
        if let Some(max) = range.max {
            if value > max {
                let message = format!(
                    "{} {} above maximum {}",
                    parameter.label(),
                    quantity(parameter, value),
                    quantity(parameter, max),
                );
                return Some(Alert::threshold(
                    tank_id,
                    parameter,
                    rule.severity,
                    message,
                    timestamp,
                ));
            }
        }
    }

    None
}

/// Evaluate every present parameter, pairing each violation with its
/// parameter, in the fixed order.
///
/// Absent parameters are skipped, never treated as violations. Deterministic
/// and side-effect free.
pub fn violations(reading: &Reading, thresholds: &Thresholds) -> Vec<(WaterParameter, Alert)> {
    let mut found = Vec::new();

    for parameter in WaterParameter::ALL {
        let Some(value) = reading.value(parameter) else {
            continue;
        };

        if let Some(alert) = check(
            parameter,
            value,
            thresholds.range(parameter),
            &reading.tank_id,
            reading.timestamp,
        ) {
            debug!(
                tank_id = %reading.tank_id,
                parameter = parameter.label(),
                value,
                severity = %alert.severity,
                "threshold violation"
            );
            found.push((parameter, alert));
        }
    }

    found
}

/// Every violation alert for a reading, in the fixed parameter order.
pub fn evaluate_all(reading: &Reading, thresholds: &Thresholds) -> Vec<Alert> {
    violations(reading, thresholds)
        .into_iter()
        .map(|(_, alert)| alert)
        .collect()
}

/// The single highest-severity alert for a reading, if any.
///
/// Ties are broken by the fixed parameter order: `evaluate_all` emits in
/// that order and the fold keeps the earliest on equal severity.
pub fn evaluate(reading: &Reading, thresholds: &Thresholds) -> Option<Alert> {
    evaluate_all(reading, thresholds)
        .into_iter()
        .reduce(|best, candidate| {
            if candidate.severity > best.severity {
                candidate
            } else {
                best
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tank_telemetry::ParameterRange;

    fn reading(tank_id: &str) -> Reading {
        Reading::new(tank_id, Utc::now())
    }

    #[test]
    fn test_clean_reading_yields_nothing() {
        let mut r = reading("tank-1");
        r.ph = Some(7.5);
        r.dissolved_oxygen = Some(6.0);
        r.ammonia = Some(0.1);

        let thresholds = Thresholds::default();
        assert!(evaluate_all(&r, &thresholds).is_empty());
        assert!(evaluate(&r, &thresholds).is_none());
    }

    #[test]
    fn test_empty_reading_yields_nothing() {
        let thresholds = Thresholds::default();
        assert!(evaluate_all(&reading("tank-1"), &thresholds).is_empty());
    }

    #[test]
    fn test_ammonia_breach_is_critical_regardless_of_magnitude() {
        let thresholds = Thresholds {
            ammonia: ParameterRange::at_most(0.5),
            ..Default::default()
        };

        for value in [0.51, 1.0, 50.0] {
            let mut r = reading("tank-1");
            r.ammonia = Some(value);

            let alerts = evaluate_all(&r, &thresholds);
            assert_eq!(alerts.len(), 1);
            assert_eq!(alerts[0].severity, AlertSeverity::Critical);
            assert_eq!(alerts[0].parameter, "Ammonia");
        }
    }

    #[test]
    fn test_low_dissolved_oxygen_is_critical() {
        let mut r = reading("tank-1");
        r.dissolved_oxygen = Some(3.0);

        let alert = evaluate(&r, &Thresholds::default()).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.parameter, "Dissolved oxygen");
        assert!(alert.message.contains("mg/L"));
    }

    #[test]
    fn test_two_sided_parameters_warn() {
        let thresholds = Thresholds::default();

        let cases = [
            (WaterParameter::Ph, 6.0),
            (WaterParameter::Salinity, 5.0),
            (WaterParameter::Temperature, 18.0),
            (WaterParameter::WaterLevel, 10.0),
            (WaterParameter::TotalDissolvedSolids, 50.0),
        ];

        for (parameter, value) in cases {
            let mut r = reading("tank-1");
            match parameter {
                WaterParameter::Ph => r.ph = Some(value),
                WaterParameter::Salinity => r.salinity = Some(value),
                WaterParameter::Temperature => r.temperature = Some(value),
                WaterParameter::WaterLevel => r.water_level = Some(value),
                WaterParameter::TotalDissolvedSolids => {
                    r.total_dissolved_solids = Some(value)
                }
                _ => unreachable!(),
            }

            let alert = evaluate(&r, &thresholds).unwrap();
            assert_eq!(alert.severity, AlertSeverity::Warning, "{:?}", parameter);
        }
    }

    #[test]
    fn test_turbidity_only_checks_maximum() {
        let thresholds = Thresholds {
            // A configured minimum must be ignored for turbidity.
            turbidity: ParameterRange::between(5.0, 50.0),
            ..Default::default()
        };

        let mut low = reading("tank-1");
        low.turbidity = Some(1.0);
        assert!(evaluate_all(&low, &thresholds).is_empty());

        let mut high = reading("tank-1");
        high.turbidity = Some(80.0);
        let alerts = evaluate_all(&high, &thresholds);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
    }

    #[test]
    fn test_critical_wins_over_warning() {
        let mut r = reading("tank-1");
        r.ph = Some(6.0); // warning
        r.dissolved_oxygen = Some(3.0); // critical
        r.temperature = Some(18.0); // warning

        let thresholds = Thresholds::default();
        let all = evaluate_all(&r, &thresholds);
        assert_eq!(all.len(), 3);

        let top = evaluate(&r, &thresholds).unwrap();
        assert_eq!(top.parameter, "Dissolved oxygen");
        assert_eq!(top.severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_warning_tie_broken_by_parameter_order() {
        let mut r = reading("tank-1");
        r.ph = Some(6.0);
        r.temperature = Some(18.0);

        let top = evaluate(&r, &Thresholds::default()).unwrap();
        assert_eq!(top.parameter, "pH");
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let mut r = reading("tank-1");
        r.ammonia = Some(1.0);
        let thresholds = Thresholds::default();

        let first = evaluate_all(&r, &thresholds);
        let second = evaluate_all(&r, &thresholds);
        assert_eq!(first, second);
    }

    #[test]
    fn test_example_scenario_from_rule_table() {
        let thresholds = Thresholds {
            ammonia: ParameterRange::at_most(0.5),
            ..Default::default()
        };

        let mut r = reading("tank-1");
        r.ammonia = Some(1.0);

        let alert = evaluate(&r, &thresholds).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.parameter, "Ammonia");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn in_range_readings_never_alert(
                ph in 7.0..=8.5f64,
                dissolved_oxygen in 5.0..=12.0f64,
                salinity in 10.0..=25.0f64,
                ammonia in 0.0..=0.5f64,
                temperature in 24.0..=30.0f64,
            ) {
                let mut r = Reading::new("tank-1", Utc::now());
                r.ph = Some(ph);
                r.dissolved_oxygen = Some(dissolved_oxygen);
                r.salinity = Some(salinity);
                r.ammonia = Some(ammonia);
                r.temperature = Some(temperature);

                prop_assert!(evaluate_all(&r, &Thresholds::default()).is_empty());
            }

            #[test]
            fn evaluation_never_panics(
                ph in proptest::option::of(-1000.0..1000.0f64),
                ammonia in proptest::option::of(-1000.0..1000.0f64),
                turbidity in proptest::option::of(-1000.0..1000.0f64),
            ) {
                let mut r = Reading::new("tank-1", Utc::now());
                r.ph = ph;
                r.ammonia = ammonia;
                r.turbidity = turbidity;

                let all = evaluate_all(&r, &Thresholds::default());
                let top = evaluate(&r, &Thresholds::default());
                prop_assert_eq!(top.is_some(), !all.is_empty());
            }
        }
    }
}
