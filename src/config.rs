//! Environment configuration
//!
//! Every knob is an environment variable with a default; only `DATABASE_URL`
//! is required. `.env` is loaded through dotenvy when present.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::jobs::archive_transfer::{
    DEFAULT_PERIOD_SECS, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_SECS, TransferSchedule,
};
use crate::models::SampleTable;
use crate::services::archiver::{ArchiverConfig, DEFAULT_VERIFY_WINDOW};
use crate::services::binance_ticker::{
    DEFAULT_BINANCE_API_URL, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_TICKER_SYMBOL,
};
use crate::services::collector::{
    CollectorConfig, DEFAULT_ERROR_BACKOFF, DEFAULT_MAX_ITERATIONS, DEFAULT_SUCCESS_DELAY,
};

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const ARCHIVE_DATABASE_URL: &str = "ARCHIVE_DATABASE_URL";
pub const BINANCE_API_URL: &str = "BINANCE_API_URL";
pub const TICKER_SYMBOL: &str = "TICKER_SYMBOL";
pub const HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
pub const COLLECTOR_MAX_SAMPLES: &str = "COLLECTOR_MAX_SAMPLES";
pub const COLLECTOR_INTERVAL_SECS: &str = "COLLECTOR_INTERVAL_SECS";
pub const COLLECTOR_ERROR_BACKOFF_SECS: &str = "COLLECTOR_ERROR_BACKOFF_SECS";
pub const ARCHIVE_INTERVAL_SECS: &str = "ARCHIVE_INTERVAL_SECS";
pub const ARCHIVE_RETRIES: &str = "ARCHIVE_RETRIES";
pub const ARCHIVE_RETRY_DELAY_SECS: &str = "ARCHIVE_RETRY_DELAY_SECS";
pub const ARCHIVE_VERIFY_WINDOW_SECS: &str = "ARCHIVE_VERIFY_WINDOW_SECS";
pub const CHART_LIMIT: &str = "CHART_LIMIT";

/// Default number of rows the chart reads
pub const DEFAULT_CHART_LIMIT: u64 = 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Target of the archive transfer, same as `database_url` unless set
    pub archive_database_url: String,
    pub binance_api_url: String,
    pub ticker_symbol: String,
    pub http_timeout: Duration,
    /// 0 collects until shutdown
    pub collector_max_samples: u64,
    pub collector_interval: Duration,
    pub collector_error_backoff: Duration,
    pub archive_interval: Duration,
    pub archive_retries: u32,
    pub archive_retry_delay: Duration,
    pub archive_verify_window: Duration,
    pub chart_limit: u64,
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => match value.trim().parse() {
            Ok(parsed) => Ok(parsed),
            Err(_) => Err(ConfigError::Invalid { key, value }),
        },
        _ => Ok(default),
    }
}

fn secs_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_or(lookup, key, default.as_secs()).map(Duration::from_secs)
}

fn string_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup(DATABASE_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(DATABASE_URL))?;
        let archive_database_url = string_or(&lookup, ARCHIVE_DATABASE_URL, &database_url);

        Ok(Self {
            archive_database_url,
            binance_api_url: string_or(&lookup, BINANCE_API_URL, DEFAULT_BINANCE_API_URL),
            ticker_symbol: string_or(&lookup, TICKER_SYMBOL, DEFAULT_TICKER_SYMBOL),
            http_timeout: secs_or(
                &lookup,
                HTTP_TIMEOUT_SECS,
                Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            )?,
            collector_max_samples: parse_or(&lookup, COLLECTOR_MAX_SAMPLES, DEFAULT_MAX_ITERATIONS)?,
            collector_interval: secs_or(&lookup, COLLECTOR_INTERVAL_SECS, DEFAULT_SUCCESS_DELAY)?,
            collector_error_backoff: secs_or(
                &lookup,
                COLLECTOR_ERROR_BACKOFF_SECS,
                DEFAULT_ERROR_BACKOFF,
            )?,
            archive_interval: secs_or(
                &lookup,
                ARCHIVE_INTERVAL_SECS,
                Duration::from_secs(DEFAULT_PERIOD_SECS),
            )?,
            archive_retries: parse_or(&lookup, ARCHIVE_RETRIES, DEFAULT_RETRIES)?,
            archive_retry_delay: secs_or(
                &lookup,
                ARCHIVE_RETRY_DELAY_SECS,
                Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            )?,
            archive_verify_window: secs_or(
                &lookup,
                ARCHIVE_VERIFY_WINDOW_SECS,
                DEFAULT_VERIFY_WINDOW,
            )?,
            chart_limit: parse_or(&lookup, CHART_LIMIT, DEFAULT_CHART_LIMIT)?,
            database_url,
        })
    }

    /// Database holding `table`: the archive lives on the transfer target
    pub fn history_database_url(&self, table: SampleTable) -> &str {
        match table {
            SampleTable::Live => &self.database_url,
            SampleTable::Archive => &self.archive_database_url,
        }
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            max_iterations: (self.collector_max_samples > 0).then_some(self.collector_max_samples),
            success_delay: self.collector_interval,
            error_backoff: self.collector_error_backoff,
        }
    }

    pub fn archiver_config(&self) -> ArchiverConfig {
        ArchiverConfig {
            verify_window: self.archive_verify_window,
        }
    }

    pub fn schedule(&self) -> TransferSchedule {
        TransferSchedule {
            period: self.archive_interval,
            retries: self.archive_retries,
            retry_delay: self.archive_retry_delay,
            run_on_start: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            AppConfig::from_lookup(lookup(&[(DATABASE_URL, "postgres://localhost/prices")]))
                .unwrap();

        assert_eq!(config.archive_database_url, "postgres://localhost/prices");
        assert_eq!(config.binance_api_url, "https://api.binance.com");
        assert_eq!(config.ticker_symbol, "BTCUSDT");
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.chart_limit, 1000);

        let collector = config.collector_config();
        assert_eq!(collector.max_iterations, Some(10_000));
        assert_eq!(collector.success_delay, Duration::from_secs(1));
        assert_eq!(collector.error_backoff, Duration::from_secs(5));

        let schedule = config.schedule();
        assert_eq!(schedule.period, Duration::from_secs(900));
        assert_eq!(schedule.retries, 2);
        assert_eq!(schedule.retry_delay, Duration::from_secs(60));

        assert_eq!(
            config.archiver_config().verify_window,
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_missing_database_url() {
        assert_eq!(
            AppConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing(DATABASE_URL)
        );
        assert_eq!(
            AppConfig::from_lookup(lookup(&[(DATABASE_URL, "  ")])).unwrap_err(),
            ConfigError::Missing(DATABASE_URL)
        );
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (DATABASE_URL, "postgres://source/db"),
            (ARCHIVE_DATABASE_URL, "postgres://target/db"),
            (COLLECTOR_MAX_SAMPLES, "0"),
            (ARCHIVE_RETRIES, "5"),
            (ARCHIVE_INTERVAL_SECS, " 60 "),
        ]))
        .unwrap();

        assert_eq!(config.archive_database_url, "postgres://target/db");
        assert_eq!(config.collector_config().max_iterations, None);
        assert_eq!(config.schedule().retries, 5);
        assert_eq!(config.schedule().period, Duration::from_secs(60));
    }

    #[test]
    fn test_history_reads_each_table_from_its_own_database() {
        let split = AppConfig::from_lookup(lookup(&[
            (DATABASE_URL, "postgres://source/db"),
            (ARCHIVE_DATABASE_URL, "postgres://target/archive"),
        ]))
        .unwrap();

        assert_eq!(
            split.history_database_url(SampleTable::Archive),
            "postgres://target/archive"
        );
        assert_eq!(
            split.history_database_url(SampleTable::Live),
            "postgres://source/db"
        );

        let shared =
            AppConfig::from_lookup(lookup(&[(DATABASE_URL, "postgres://source/db")])).unwrap();
        assert_eq!(
            shared.history_database_url(SampleTable::Archive),
            "postgres://source/db"
        );
    }

    #[test]
    fn test_invalid_number() {
        let err = AppConfig::from_lookup(lookup(&[
            (DATABASE_URL, "postgres://localhost/prices"),
            (CHART_LIMIT, "lots"),
        ]))
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::Invalid {
                key: CHART_LIMIT,
                value: "lots".to_string()
            }
        );
    }
}
