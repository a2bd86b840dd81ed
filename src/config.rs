//! Environment-driven configuration.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file. Every variable has a default except `DATABASE_URL` and
//! `CONVERTER_PATH`, which are optional.

use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::pipeline::converter::DEFAULT_TIMEOUT_SECS;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub app_url: String,
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub storage_dir: PathBuf,
    pub converter_path: Option<PathBuf>,
    pub converter_timeout: Duration,
    pub sweep_interval: Duration,
    pub sweep_max_age: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "report-converter".to_string(),
            app_url: "http://127.0.0.1:8080".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: None,
            storage_dir: PathBuf::from("storage"),
            converter_path: None,
            converter_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            sweep_interval: Duration::from_secs(600),
            sweep_max_age: Duration::from_secs(3600),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            app_name: non_empty("APP_NAME").unwrap_or(defaults.app_name),
            app_url: non_empty("APP_URL").unwrap_or(defaults.app_url),
            host: non_empty("APP_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "APP_PORT", defaults.port)?,
            database_url: non_empty("DATABASE_URL"),
            storage_dir: non_empty("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            converter_path: non_empty("CONVERTER_PATH").map(PathBuf::from),
            converter_timeout: Duration::from_secs(parse_or(
                &lookup,
                "CONVERTER_TIMEOUT_SECS",
                defaults.converter_timeout.as_secs(),
            )?),
            sweep_interval: Duration::from_secs(parse_or(
                &lookup,
                "SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )?),
            sweep_max_age: Duration::from_secs(parse_or(
                &lookup,
                "SWEEP_MAX_AGE_SECS",
                defaults.sweep_max_age.as_secs(),
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject durations the converter and sweeper cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.converter_timeout.is_zero() {
            bail!("invalid value for CONVERTER_TIMEOUT_SECS: must be greater than 0");
        }
        if self.sweep_interval.is_zero() {
            bail!("invalid value for SWEEP_INTERVAL_SECS: must be greater than 0");
        }
        if self.sweep_max_age <= self.converter_timeout {
            bail!(
                "invalid value for SWEEP_MAX_AGE_SECS: {}s must exceed CONVERTER_TIMEOUT_SECS ({}s)",
                self.sweep_max_age.as_secs(),
                self.converter_timeout.as_secs()
            );
        }
        Ok(())
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.storage_dir.join("templates")
    }

    /// Working directory shared by intermediate and output artifacts.
    pub fn generated_dir(&self) -> PathBuf {
        self.storage_dir.join("generated_pdf")
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("invalid value for {}: '{}' ({})", key, raw, e)),
        None => Ok(default),
    }
}
