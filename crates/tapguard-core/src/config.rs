//! Engine configuration.
//!
//! Provides [`EngineConfig`] with the production defaults. Values can be
//! layered from an optional TOML/JSON file and from `TAPGUARD_*` environment
//! variables, environment taking precedence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_TAPS_PER_SECOND, DEFAULT_MIN_TAP_INTERVAL_MS, DEFAULT_RHYTHM_VARIANCE_THRESHOLD_MS2,
    DEFAULT_SUSPICIOUS_PATTERN_THRESHOLD,
};
use crate::error::ConfigError;

/// Environment variable prefix, e.g. `TAPGUARD_MAX_TAPS_PER_SECOND`.
pub const ENV_PREFIX: &str = "TAPGUARD";

/// What a gate does when the shared store cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Let the gate pass with zero delta and log the degradation.
    #[default]
    FailOpen,
    /// Hard-reject the tap with `"store unavailable"`.
    FailClosed,
}

/// Tunables for the anti-cheat pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Global kill switch. When `false` every tap passes untouched.
    pub anti_cheat_enabled: bool,
    /// Rate Limiter ceiling per wall-clock second.
    pub max_taps_per_second: u32,
    /// Autoclicker floor in milliseconds.
    pub min_tap_interval_ms: u64,
    /// Consecutive low-variance windows before the rhythm penalty applies.
    pub suspicious_pattern_threshold: u32,
    /// Variance (ms²) below which a window counts as perfect rhythm.
    pub rhythm_variance_threshold_ms2: f64,
    /// Behaviour when the shared store is unreachable.
    pub store_failure_policy: FailurePolicy,
    /// Maximum tolerated client clock drift. `None` disables the drift gate.
    pub max_client_drift_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            anti_cheat_enabled: true,
            max_taps_per_second: DEFAULT_MAX_TAPS_PER_SECOND,
            min_tap_interval_ms: DEFAULT_MIN_TAP_INTERVAL_MS,
            suspicious_pattern_threshold: DEFAULT_SUSPICIOUS_PATTERN_THRESHOLD,
            rhythm_variance_threshold_ms2: DEFAULT_RHYTHM_VARIANCE_THRESHOLD_MS2,
            store_failure_policy: FailurePolicy::FailOpen,
            max_client_drift_ms: None,
        }
    }
}

impl EngineConfig {
    /// Configuration with the engine switched off.
    pub fn disabled() -> Self {
        Self {
            anti_cheat_enabled: false,
            ..Self::default()
        }
    }

    /// Load from an optional file plus `TAPGUARD_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Load from an optional file plus an explicit environment source.
    pub fn load_with_env(
        path: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let cfg: EngineConfig = builder
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would disable a gate by accident.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_taps_per_second == 0 {
            return Err(ConfigError::Invalid {
                field: "max_taps_per_second",
                reason: "must be at least 1".into(),
            });
        }
        if self.suspicious_pattern_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "suspicious_pattern_threshold",
                reason: "must be at least 1".into(),
            });
        }
        if !self.rhythm_variance_threshold_ms2.is_finite() || self.rhythm_variance_threshold_ms2 < 0.0
        {
            return Err(ConfigError::Invalid {
                field: "rhythm_variance_threshold_ms2",
                reason: format!(
                    "must be a non-negative number, got {}",
                    self.rhythm_variance_threshold_ms2
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EngineConfig::default();
        assert!(cfg.anti_cheat_enabled);
        assert_eq!(cfg.max_taps_per_second, 10);
        assert_eq!(cfg.min_tap_interval_ms, 50);
        assert_eq!(cfg.suspicious_pattern_threshold, 50);
        assert_eq!(cfg.rhythm_variance_threshold_ms2, 100.0);
        assert_eq!(cfg.store_failure_policy, FailurePolicy::FailOpen);
        assert!(cfg.max_client_drift_ms.is_none());
    }

    #[test]
    fn empty_sources_yield_defaults() {
        let cfg = EngineConfig::load_with_env(None, env(&[])).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "max_taps_per_second = 6\nstore_failure_policy = \"fail_closed\"\nrhythm_variance_threshold_ms2 = 42.5"
        )
        .unwrap();

        let cfg = EngineConfig::load_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(cfg.max_taps_per_second, 6);
        assert_eq!(cfg.store_failure_policy, FailurePolicy::FailClosed);
        assert_eq!(cfg.rhythm_variance_threshold_ms2, 42.5);
        // untouched fields keep their defaults
        assert_eq!(cfg.min_tap_interval_ms, 50);
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_taps_per_second = 6").unwrap();

        let cfg = EngineConfig::load_with_env(
            Some(file.path()),
            env(&[
                ("TAPGUARD_MAX_TAPS_PER_SECOND", "12"),
                ("TAPGUARD_ANTI_CHEAT_ENABLED", "false"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.max_taps_per_second, 12);
        assert!(!cfg.anti_cheat_enabled);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = EngineConfig::load_with_env(Some(&missing), env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn zero_rate_cap_is_rejected() {
        let cfg = EngineConfig {
            max_taps_per_second: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "max_taps_per_second", .. })
        ));
    }

    #[test]
    fn nan_variance_threshold_is_rejected() {
        let cfg = EngineConfig {
            rhythm_variance_threshold_ms2: f64::NAN,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn disabled_preset() {
        let cfg = EngineConfig::disabled();
        assert!(!cfg.anti_cheat_enabled);
        assert!(cfg.validate().is_ok());
    }
}
