//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CIERRE_DECREMENT_POLICY=courier_pass                               │
//! │     CIERRE_SURCHARGE_BPS=1000                                          │
//! │     CIERRE_UTC_OFFSET_MINUTES=-180                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $CIERRE_CONFIG, or                                                 │
//! │     ~/.config/cierre/cierre.toml (Linux)                               │
//! │     ~/Library/Application Support/com.cierre.cierre/cierre.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     global_pass, 1000 bps (10%), UTC-3                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # cierre.toml
//! decrement_policy = "global_pass"   # global_pass | courier_pass
//! surcharge_bps = 1000               # transferencia / tarjeta surcharge
//! business_utc_offset_minutes = -180 # where the business day starts
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use cierre_core::validation::{validate_surcharge_bps, validate_utc_offset};
use cierre_core::{
    DecrementPolicy, SurchargeRate, DEFAULT_SURCHARGE_BPS, DEFAULT_UTC_OFFSET_MINUTES,
};

pub const ENV_CONFIG_PATH: &str = "CIERRE_CONFIG";
pub const ENV_DECREMENT_POLICY: &str = "CIERRE_DECREMENT_POLICY";
pub const ENV_SURCHARGE_BPS: &str = "CIERRE_SURCHARGE_BPS";
pub const ENV_UTC_OFFSET_MINUTES: &str = "CIERRE_UTC_OFFSET_MINUTES";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings of the closing engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Which closing pass decrements stock.
    #[serde(default)]
    pub decrement_policy: DecrementPolicy,

    /// Surcharge on transfer and card payments, in basis points.
    #[serde(default = "default_surcharge_bps")]
    pub surcharge_bps: u32,

    /// Offset from UTC at which the business day starts.
    #[serde(default = "default_utc_offset")]
    pub business_utc_offset_minutes: i32,
}

fn default_surcharge_bps() -> u32 {
    DEFAULT_SURCHARGE_BPS
}

fn default_utc_offset() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            decrement_policy: DecrementPolicy::default(),
            surcharge_bps: default_surcharge_bps(),
            business_utc_offset_minutes: default_utc_offset(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (explicit path, `CIERRE_CONFIG`, or the platform config dir)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from))
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns the defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        validate_surcharge_bps(self.surcharge_bps)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        validate_utc_offset(self.business_utc_offset_minutes)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// [`EngineConfig::load`]). Unparsable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(policy) = lookup(ENV_DECREMENT_POLICY) {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding decrement policy from environment");
                    self.decrement_policy = parsed;
                }
                Err(_) => warn!(policy = %policy, "Unknown decrement policy in environment"),
            }
        }

        if let Some(bps) = lookup(ENV_SURCHARGE_BPS) {
            match bps.trim().parse::<u32>() {
                Ok(parsed) => self.surcharge_bps = parsed,
                Err(_) => warn!(value = %bps, "Invalid surcharge bps in environment"),
            }
        }

        if let Some(offset) = lookup(ENV_UTC_OFFSET_MINUTES) {
            match offset.trim().parse::<i32>() {
                Ok(parsed) => self.business_utc_offset_minutes = parsed,
                Err(_) => warn!(value = %offset, "Invalid UTC offset in environment"),
            }
        }
    }

    /// `cierre.toml` in the platform config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "cierre", "cierre")
            .map(|dirs| dirs.config_dir().join("cierre.toml"))
    }

    pub fn surcharge_rate(&self) -> SurchargeRate {
        SurchargeRate::from_bps(self.surcharge_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.decrement_policy, DecrementPolicy::GlobalPass);
        assert_eq!(config.surcharge_bps, 1000);
        assert_eq!(config.business_utc_offset_minutes, -180);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str(r#"decrement_policy = "courier_pass""#).unwrap();
        assert_eq!(config.decrement_policy, DecrementPolicy::CourierPass);
        assert_eq!(config.surcharge_bps, 1000);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config: EngineConfig = toml::from_str(
            r#"
            decrement_policy = "global_pass"
            surcharge_bps = 500
            "#,
        )
        .unwrap();

        config.apply_overrides(env(&[
            (ENV_DECREMENT_POLICY, "courier-pass"),
            (ENV_SURCHARGE_BPS, "1500"),
            (ENV_UTC_OFFSET_MINUTES, "60"),
        ]));

        assert_eq!(config.decrement_policy, DecrementPolicy::CourierPass);
        assert_eq!(config.surcharge_bps, 1500);
        assert_eq!(config.business_utc_offset_minutes, 60);
    }

    #[test]
    fn test_bad_env_values_are_ignored() {
        let mut config = EngineConfig::default();
        config.apply_overrides(env(&[
            (ENV_DECREMENT_POLICY, "whenever"),
            (ENV_SURCHARGE_BPS, "ten percent"),
        ]));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let mut config = EngineConfig::default();
        config.surcharge_bps = 20_000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = EngineConfig::default();
        config.business_utc_offset_minutes = 24 * 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let path = std::env::temp_dir().join(format!("cierre-config-{}.toml", std::process::id()));
        std::fs::write(&path, "surcharge_bps = 0\nbusiness_utc_offset_minutes = 0\n").unwrap();

        let config = EngineConfig::load(Some(path.clone())).unwrap();
        std::fs::remove_file(&path).unwrap();

        // Environment variables may still override in CI; the file values are the baseline
        if std::env::var(ENV_SURCHARGE_BPS).is_err() {
            assert_eq!(config.surcharge_bps, 0);
        }
        assert!(config.surcharge_rate().bps() <= 10_000);
    }
}
