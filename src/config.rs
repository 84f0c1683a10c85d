//! Environment-based configuration (spec §6, §4.0).
//!
//! Translated from `original_source/ecfr_fetcher/app/config.py`'s `pydantic_settings`
//! `Settings` class into a typed loader. A missing required variable is a `ConfigError`,
//! which callers treat as fatal at startup.

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("environment variable {name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Default eCFR API base URL, used when `ECFR_BASE_URL` is unset.
pub const DEFAULT_ECFR_BASE_URL: &str = "https://www.ecfr.gov/api";

/// Default title-interest filter, used when `ECFR_INTEREST_TITLES` is unset.
const DEFAULT_INTEREST_TITLES: &[i32] = &[7, 50];

/// Default lock TTL for reclaiming stale PROCESSING jobs (one hour, per spec §5).
const DEFAULT_LOCK_TTL_SECONDS: u64 = 3600;

const DEFAULT_WORKER_COUNT: usize = 3;
const DEFAULT_BATCH_SIZE: i64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub ecfr_base_url: String,
    pub interest_titles: Vec<i32>,
    pub lock_ttl: Duration,
    pub worker_count: usize,
    pub batch_size: i64,
}

impl Config {
    /// Load configuration from the process environment. See spec §6 for the variable list.
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_host = required("DB_HOST")?;
        let db_port = required("DB_PORT")?
            .parse::<u16>()
            .map_err(|e| invalid("DB_PORT", &env_or_empty("DB_PORT"), e))?;
        let db_name = required("DB_NAME")?;
        let db_user = required("DB_USER")?;
        let db_password = required("DB_PASSWORD")?;
        let ecfr_base_url =
            env::var("ECFR_BASE_URL").unwrap_or_else(|_| DEFAULT_ECFR_BASE_URL.to_string());

        let interest_titles = match env::var("ECFR_INTEREST_TITLES") {
            Ok(raw) => parse_title_list(&raw)?,
            Err(_) => DEFAULT_INTEREST_TITLES.to_vec(),
        };

        let lock_ttl = match env::var("ECFR_LOCK_TTL_SECONDS") {
            Ok(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .map_err(|e| invalid("ECFR_LOCK_TTL_SECONDS", &raw, e))?,
            ),
            Err(_) => Duration::from_secs(DEFAULT_LOCK_TTL_SECONDS),
        };

        let worker_count = match env::var("ECFR_WORKER_COUNT") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|e| invalid("ECFR_WORKER_COUNT", &raw, e))?,
            Err(_) => DEFAULT_WORKER_COUNT,
        };

        let batch_size = match env::var("ECFR_BATCH_SIZE") {
            Ok(raw) => raw
                .parse::<i64>()
                .map_err(|e| invalid("ECFR_BATCH_SIZE", &raw, e))?,
            Err(_) => DEFAULT_BATCH_SIZE,
        };

        Ok(Config {
            db_host,
            db_port,
            db_name,
            db_user,
            db_password,
            ecfr_base_url,
            interest_titles,
            lock_ttl,
            worker_count,
            batch_size,
        })
    }

    /// Postgres connection string derived from the discrete DB_* fields.
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{user}:{password}@{host}:{port}/{name}",
            user = self.db_user,
            password = self.db_password,
            host = self.db_host,
            port = self.db_port,
            name = self.db_name,
        )
    }
}

fn env_or_empty(name: &str) -> String {
    env::var(name).unwrap_or_default()
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn invalid(name: &'static str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_title_list(raw: &str) -> Result<Vec<i32>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i32>().map_err(|e| ConfigError::Invalid {
                name: "ECFR_INTEREST_TITLES",
                value: raw.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interest_title_list() {
        assert_eq!(parse_title_list("7,50").unwrap(), vec![7, 50]);
        assert_eq!(parse_title_list(" 7 , 50 ,21").unwrap(), vec![7, 50, 21]);
    }

    #[test]
    fn rejects_non_numeric_title() {
        assert!(parse_title_list("7,abc").is_err());
    }

    #[test]
    fn defaults_match_spec() {
        assert_eq!(DEFAULT_INTEREST_TITLES, &[7, 50]);
        assert_eq!(DEFAULT_LOCK_TTL_SECONDS, 3600);
    }
}
