//! Configuration module
//!
//! Loads configuration from environment variables.

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::InterestPolicy;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Fraction of the balance credited per interest run
    pub interest_rate: Decimal,

    /// Interest stops once the balance would exceed initial balance times this
    pub interest_limit_multiplier: Decimal,

    /// Decimal places interest is rounded to
    pub interest_scale: u32,

    /// Seconds between interest runs
    pub interest_interval_secs: u64,

    /// Longest wait for an account lock, in milliseconds
    pub lock_timeout_ms: u64,

    /// Log output format: "text" or "json"
    pub log_format: String,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", "10")?;
        let interest_rate = parse_or("INTEREST_RATE", "0.05")?;
        let interest_limit_multiplier = parse_or("INTEREST_LIMIT_MULTIPLIER", "2.07")?;
        let interest_scale = parse_or("INTEREST_SCALE", "2")?;
        let interest_interval_secs: u64 = parse_or("INTEREST_INTERVAL_SECS", "60")?;
        let lock_timeout_ms: u64 = parse_or("LOCK_TIMEOUT_MS", "5000")?;

        if interest_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("INTEREST_INTERVAL_SECS"));
        }
        if lock_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("LOCK_TIMEOUT_MS"));
        }

        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
        if log_format != "text" && log_format != "json" {
            return Err(ConfigError::InvalidValue("LOG_FORMAT"));
        }

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        Ok(Self {
            database_url,
            database_max_connections,
            interest_rate,
            interest_limit_multiplier,
            interest_scale,
            interest_interval_secs,
            lock_timeout_ms,
            log_format,
            environment,
        })
    }

    pub fn interest_policy(&self) -> InterestPolicy {
        InterestPolicy::new(
            self.interest_rate,
            self.interest_limit_multiplier,
            self.interest_scale,
        )
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn interest_interval(&self) -> Duration {
        Duration::from_secs(self.interest_interval_secs)
    }

    /// Check if logs should be emitted as JSON
    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
