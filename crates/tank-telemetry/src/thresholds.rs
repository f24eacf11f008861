//! Per-tank threshold configuration

use crate::error::TelemetryError;
use crate::reading::WaterParameter;
use serde::{Deserialize, Serialize};

/// Acceptable range for one parameter.
///
/// Either bound may be absent for single-bound rules (e.g. ammonia is
/// only checked against a maximum).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ParameterRange {
    /// Range with both bounds.
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Range with only a lower bound.
    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Range with only an upper bound.
    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }
}

/// Threshold configuration for one tank, one range per parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub ph: ParameterRange,
    pub dissolved_oxygen: ParameterRange,
    pub salinity: ParameterRange,
    pub ammonia: ParameterRange,
    pub temperature: ParameterRange,
    pub water_level: ParameterRange,
    pub total_dissolved_solids: ParameterRange,
    pub turbidity: ParameterRange,
}

impl Default for Thresholds {
    fn default() -> Self {
        // Defaults for a brackish crustacean grow-out tank.
        Self {
            ph: ParameterRange::between(7.0, 8.5),
            dissolved_oxygen: ParameterRange::at_least(5.0),
            salinity: ParameterRange::between(10.0, 25.0),
            ammonia: ParameterRange::at_most(0.5),
            temperature: ParameterRange::between(24.0, 30.0),
            water_level: ParameterRange::between(40.0, 80.0),
            total_dissolved_solids: ParameterRange::between(100.0, 400.0),
            turbidity: ParameterRange::at_most(50.0),
        }
    }
}

impl Thresholds {
    /// Get the configured range for a parameter.
    pub fn range(&self, parameter: WaterParameter) -> ParameterRange {
        match parameter {
            WaterParameter::Ph => self.ph,
            WaterParameter::DissolvedOxygen => self.dissolved_oxygen,
            WaterParameter::Salinity => self.salinity,
            WaterParameter::Ammonia => self.ammonia,
            WaterParameter::Temperature => self.temperature,
            WaterParameter::WaterLevel => self.water_level,
            WaterParameter::TotalDissolvedSolids => self.total_dissolved_solids,
            WaterParameter::Turbidity => self.turbidity,
        }
    }

    /// Validate that every ranged parameter satisfies min <= max.
    ///
    /// Runs at configuration time; evaluation never re-checks.
    pub fn validate(&self) -> Result<(), TelemetryError> {
        for parameter in WaterParameter::ALL {
            let range = self.range(parameter);
            if let (Some(min), Some(max)) = (range.min, range.max) {
                if min > max {
                    return Err(TelemetryError::InvalidRange {
                        parameter: parameter.label(),
                        min,
                        max,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Thresholds::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let thresholds = Thresholds {
            temperature: ParameterRange::between(30.0, 24.0),
            ..Default::default()
        };

        let err = thresholds.validate().unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::InvalidRange {
                parameter: "Temperature",
                ..
            }
        ));
    }

    #[test]
    fn test_single_bound_ranges_always_valid() {
        let thresholds = Thresholds {
            ammonia: ParameterRange::at_most(0.1),
            dissolved_oxygen: ParameterRange::at_least(6.0),
            ..Default::default()
        };
        assert!(thresholds.validate().is_ok());
    }
}
