//! Configuration loading and representation.
//!
//! Values come from `BINSTOCK_*` environment variables; anything unset falls
//! back to the defaults below.

use thiserror::Error;

use binstock_inventory::{ExpiryPolicy, LogGranularity};

pub const ENV_EXPIRY_CRITICAL_DAYS: &str = "BINSTOCK_EXPIRY_CRITICAL_DAYS";
pub const ENV_EXPIRY_WARNING_DAYS: &str = "BINSTOCK_EXPIRY_WARNING_DAYS";
pub const ENV_LOG_GRANULARITY: &str = "BINSTOCK_LOG_GRANULARITY";
pub const ENV_MERGE_ON_RECEIVE: &str = "BINSTOCK_MERGE_ON_RECEIVE";
pub const ENV_MAX_CONFLICT_RETRIES: &str = "BINSTOCK_MAX_CONFLICT_RETRIES";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockConfig {
    /// Near-expiry thresholds for stock boards and alerts.
    pub expiry: ExpiryPolicy,
    /// One log record per lot touched, or one summary record per allocation.
    pub log_granularity: LogGranularity,
    /// Fold lots with identical expiry and unit weight after each receipt.
    pub merge_on_receive: bool,
    /// Times an operation is recomputed after losing a compare-and-swap race.
    pub max_conflict_retries: u32,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            expiry: ExpiryPolicy::default(),
            log_granularity: LogGranularity::PerLot,
            merge_on_receive: false,
            max_conflict_retries: 3,
        }
    }
}

impl StockConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let critical = parse_or(&lookup, ENV_EXPIRY_CRITICAL_DAYS, defaults.expiry.critical_days())?;
        let warning = parse_or(&lookup, ENV_EXPIRY_WARNING_DAYS, defaults.expiry.warning_days())?;
        let expiry = ExpiryPolicy::new(critical, warning).map_err(|e| ConfigError::Invalid {
            key: ENV_EXPIRY_WARNING_DAYS,
            message: e.to_string(),
        })?;

        let log_granularity = match lookup(ENV_LOG_GRANULARITY) {
            Some(raw) => raw.parse::<LogGranularity>().map_err(|e| ConfigError::Invalid {
                key: ENV_LOG_GRANULARITY,
                message: e.to_string(),
            })?,
            None => defaults.log_granularity,
        };

        let merge_on_receive = match lookup(ENV_MERGE_ON_RECEIVE) {
            Some(raw) => parse_flag(ENV_MERGE_ON_RECEIVE, &raw)?,
            None => defaults.merge_on_receive,
        };

        let max_conflict_retries =
            parse_or(&lookup, ENV_MAX_CONFLICT_RETRIES, defaults.max_conflict_retries)?;

        Ok(Self {
            expiry,
            log_granularity,
            merge_on_receive,
            max_conflict_retries,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}
