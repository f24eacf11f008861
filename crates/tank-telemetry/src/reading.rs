//! Water-quality readings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monitored water-quality parameters, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterParameter {
    Ph,
    DissolvedOxygen,
    Salinity,
    Ammonia,
    Temperature,
    WaterLevel,
    TotalDissolvedSolids,
    Turbidity,
}

impl WaterParameter {
    /// All parameters in the fixed evaluation order.
    pub const ALL: [WaterParameter; 8] = [
        WaterParameter::Ph,
        WaterParameter::DissolvedOxygen,
        WaterParameter::Salinity,
        WaterParameter::Ammonia,
        WaterParameter::Temperature,
        WaterParameter::WaterLevel,
        WaterParameter::TotalDissolvedSolids,
        WaterParameter::Turbidity,
    ];

    /// Human-readable name used in alert messages.
    pub fn label(&self) -> &'static str {
        match self {
            WaterParameter::Ph => "pH",
            WaterParameter::DissolvedOxygen => "Dissolved oxygen",
            WaterParameter::Salinity => "Salinity",
            WaterParameter::Ammonia => "Ammonia",
            WaterParameter::Temperature => "Temperature",
            WaterParameter::WaterLevel => "Water level",
            WaterParameter::TotalDissolvedSolids => "Total dissolved solids",
            WaterParameter::Turbidity => "Turbidity",
        }
    }

    /// Measurement unit. pH is dimensionless.
    pub fn unit(&self) -> &'static str {
        match self {
            WaterParameter::Ph => "",
            WaterParameter::DissolvedOxygen => "mg/L",
            WaterParameter::Salinity => "ppt",
            WaterParameter::Ammonia => "ppm",
            WaterParameter::Temperature => "\u{b0}C",
            WaterParameter::WaterLevel => "cm",
            WaterParameter::TotalDissolvedSolids => "ppm",
            WaterParameter::Turbidity => "NTU",
        }
    }

    /// Stable key used in alert identities.
    pub fn key(&self) -> &'static str {
        match self {
            WaterParameter::Ph => "ph",
            WaterParameter::DissolvedOxygen => "dissolved_oxygen",
            WaterParameter::Salinity => "salinity",
            WaterParameter::Ammonia => "ammonia",
            WaterParameter::Temperature => "temperature",
            WaterParameter::WaterLevel => "water_level",
            WaterParameter::TotalDissolvedSolids => "total_dissolved_solids",
            WaterParameter::Turbidity => "turbidity",
        }
    }
}

/// One timestamped snapshot of tank water quality.
///
/// Every parameter is independently optional; a sensor that is absent or
/// offline simply leaves its field unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reading {
    pub tank_id: String,
    pub timestamp: DateTime<Utc>,
    pub ph: Option<f64>,
    pub dissolved_oxygen: Option<f64>,
    pub salinity: Option<f64>,
    pub ammonia: Option<f64>,
    pub temperature: Option<f64>,
    pub water_level: Option<f64>,
    pub total_dissolved_solids: Option<f64>,
    pub turbidity: Option<f64>,
}

impl Reading {
    /// Create an empty reading for a tank.
    pub fn new(tank_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            tank_id: tank_id.into(),
            timestamp,
            ..Default::default()
        }
    }

    /// Get the measured value for a parameter, if present.
    pub fn value(&self, parameter: WaterParameter) -> Option<f64> {
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

    /// Number of parameters present in this reading.
    pub fn present_count(&self) -> usize {
        WaterParameter::ALL
            .iter()
            .filter(|p| self.value(**p).is_some())
            .count()
    }
}
