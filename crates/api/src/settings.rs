//! Process configuration

use crate::rate_limit::RateLimitConfig;
use config::{Config, ConfigError, Environment, File};
use molt_risk::MoltRiskConfig;
use serde::{Deserialize, Serialize};

/// Named molt risk presets selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoltPreset {
    #[default]
    Standard,
    Strict,
    Lenient,
}

impl MoltPreset {
    pub fn molt_config(&self) -> MoltRiskConfig {
        match self {
            MoltPreset::Standard => MoltRiskConfig::default(),
            MoltPreset::Strict => MoltRiskConfig::strict(),
            MoltPreset::Lenient => MoltRiskConfig::lenient(),
        }
    }
}

/// Server settings, loaded from `moltwatch.*` files and `MOLTWATCH_*`
/// environment variables. Every field has a default, so an empty
/// environment runs out of the box.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Socket address the HTTP server binds to.
    pub bind_addr: String,
    /// Tanks to monitor at startup.
    pub tanks: Vec<String>,
    pub molt_preset: MoltPreset,
    /// Retention of the in-memory alert log.
    pub alert_log_capacity: usize,
    pub rate_limit: RateLimitConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            tanks: vec!["tank-1".to_string()],
            molt_preset: MoltPreset::Standard,
            alert_log_capacity: 512,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Settings {
    /// Layered load: defaults, then an optional `moltwatch` config file,
    /// then `MOLTWATCH_*` environment variables (e.g.
    /// `MOLTWATCH_RATE_LIMIT__BURST_SIZE=10`).
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("moltwatch").required(false))
            .add_source(Environment::with_prefix("MOLTWATCH").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.bind_addr, "0.0.0.0:8080");
        assert_eq!(settings.tanks, vec!["tank-1"]);
        assert_eq!(settings.molt_preset, MoltPreset::Standard);
        assert_eq!(settings.alert_log_capacity, 512);
    }

    #[test]
    fn test_presets_map_to_engine_configs() {
        assert_eq!(
            MoltPreset::Strict.molt_config().post_molt_window_secs,
            MoltRiskConfig::strict().post_molt_window_secs
        );
        assert_eq!(
            MoltPreset::Lenient.molt_config().standard_check_interval_secs,
            MoltRiskConfig::lenient().standard_check_interval_secs
        );
    }

    #[test]
    fn test_preset_deserializes_lowercase() {
        let preset: MoltPreset = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(preset, MoltPreset::Strict);
    }
}
