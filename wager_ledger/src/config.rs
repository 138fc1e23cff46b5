//! Ledger configuration management.
//!
//! Consolidates the environment variables the ledger reads and validates them.

use crate::db::config::parse_env_or;
use crate::vip::{VipLevelConfig, VipSchedule};
use rust_decimal::Decimal;
use std::time::Duration;

/// Runtime settings shared by the ledger components
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Balance credited to every newly created account
    pub initial_balance: Decimal,
    /// Attempts made when a commit loses a version race
    pub max_commit_retries: u32,
    /// Pause between those attempts
    pub retry_backoff: Duration,
    /// VIP tiers, lowest first
    pub vip_schedule: VipSchedule,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_balance: Decimal::from(1000),
            max_commit_retries: 5,
            retry_backoff: Duration::from_millis(5),
            vip_schedule: VipSchedule::default(),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `INITIAL_BALANCE`: balance of new accounts (default: 1000)
    /// - `LEDGER_MAX_COMMIT_RETRIES`: commit attempts on a version race (default: 5)
    /// - `LEDGER_RETRY_BACKOFF_MS`: pause between attempts (default: 5)
    /// - `VIP_SCHEDULE_FILE`: JSON array of VIP levels (default: built-in schedule)
    ///
    /// # Errors
    ///
    /// * `ConfigError::Invalid` - `INITIAL_BALANCE` is not a decimal or the schedule file is unusable
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let initial_balance = match std::env::var("INITIAL_BALANCE") {
            Ok(raw) => raw.trim().parse::<Decimal>().map_err(|e| ConfigError::Invalid {
                var: "INITIAL_BALANCE".to_string(),
                reason: e.to_string(),
            })?,
            Err(_) => defaults.initial_balance,
        };

        let vip_schedule = match std::env::var("VIP_SCHEDULE_FILE") {
            Ok(path) => load_schedule(&path)?,
            Err(_) => defaults.vip_schedule,
        };

        Ok(Self {
            initial_balance,
            max_commit_retries: parse_env_or("LEDGER_MAX_COMMIT_RETRIES", defaults.max_commit_retries),
            retry_backoff: Duration::from_millis(parse_env_or(
                "LEDGER_RETRY_BACKOFF_MS",
                defaults.retry_backoff.as_millis() as u64,
            )),
            vip_schedule,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_balance < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                var: "INITIAL_BALANCE".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }

        if self.max_commit_retries == 0 {
            return Err(ConfigError::Invalid {
                var: "LEDGER_MAX_COMMIT_RETRIES".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if self.vip_schedule.is_empty() {
            return Err(ConfigError::Invalid {
                var: "VIP_SCHEDULE_FILE".to_string(),
                reason: "Schedule has no tiers".to_string(),
            });
        }

        Ok(())
    }
}

fn load_schedule(path: &str) -> Result<VipSchedule, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: "VIP_SCHEDULE_FILE".to_string(),
        reason,
    };

    let raw = std::fs::read_to_string(path).map_err(|e| invalid(format!("{path}: {e}")))?;
    let levels: Vec<VipLevelConfig> =
        serde_json::from_str(&raw).map_err(|e| invalid(format!("{path}: {e}")))?;
    VipSchedule::from_levels(&levels).map_err(|e| invalid(e.to_string()))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config_is_valid() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.initial_balance, Decimal::from(1000));
        assert_eq!(config.max_commit_retries, 5);
    }

    #[test]
    fn test_negative_initial_balance_is_rejected() {
        let config = LedgerConfig {
            initial_balance: Decimal::from(-1),
            ..LedgerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("INITIAL_BALANCE"));
    }

    #[test]
    fn test_empty_schedule_is_rejected() {
        let config = LedgerConfig {
            vip_schedule: VipSchedule::empty(),
            ..LedgerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_overrides() {
        // SAFETY: serialized with every other test touching the environment
        unsafe {
            std::env::set_var("INITIAL_BALANCE", "250.50");
            std::env::set_var("LEDGER_MAX_COMMIT_RETRIES", "9");
        }

        let config = LedgerConfig::from_env().unwrap();

        unsafe {
            std::env::remove_var("INITIAL_BALANCE");
            std::env::remove_var("LEDGER_MAX_COMMIT_RETRIES");
        }

        assert_eq!(config.initial_balance, Decimal::new(25050, 2));
        assert_eq!(config.max_commit_retries, 9);
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_balance() {
        unsafe {
            std::env::set_var("INITIAL_BALANCE", "lots");
        }

        let result = LedgerConfig::from_env();

        unsafe {
            std::env::remove_var("INITIAL_BALANCE");
        }

        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
