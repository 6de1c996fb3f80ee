//! Configuration management for the quorlock CLI
//!
//! Values come from the optional YAML file, then `QUORLOCK_` environment
//! variables (`QUORLOCK_LOCK__RETRY_COUNT` sets `lock.retry_count`), then
//! command line overrides.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use config::{Config, Environment};
use quorlock_core::config::{DEFAULT_CLOCK_DRIFT_FACTOR, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_VALIDITY_MS};
use quorlock_core::{FencingMode, LockManagerConfig, RetryPolicy};

use crate::cli::Cli;
use crate::startup::LoggingConfig;

pub const LOCK_RETRY_COUNT: &str = "lock.retry_count";
pub const LOCK_RETRY_DELAY_MS: &str = "lock.retry_delay_ms";
pub const LOCK_RETRY_JITTER: &str = "lock.retry_jitter";
pub const LOCK_CLOCK_DRIFT_FACTOR: &str = "lock.clock_drift_factor";
pub const LOCK_CONNECT_TIMEOUT_MS: &str = "lock.connect_timeout_ms";
pub const LOCK_DEFAULT_VALIDITY_MS: &str = "lock.default_validity_ms";
pub const LOCK_FENCING: &str = "lock.fencing";
pub const STORES_COUNT: &str = "stores.count";
pub const LOG_LEVEL: &str = "log.level";
pub const LOG_DIR: &str = "log.dir";
pub const LOG_FILE: &str = "log.file";
pub const LOG_CONSOLE: &str = "log.console";

pub const DEFAULT_STORE_COUNT: usize = 3;

/// Application configuration loaded from the config file and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .add_source(config::File::from(cli.config.as_path()).required(false))
            .add_source(
                Environment::with_prefix("QUORLOCK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(v) = cli.stores {
            builder = builder
                .set_override(STORES_COUNT, v as i64)
                .context("Failed to set store count override")?;
        }
        if let Some(v) = &cli.log_level {
            builder = builder
                .set_override(LOG_LEVEL, v.as_str())
                .context("Failed to set log level override")?;
        }

        let config = builder
            .build()
            .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

        Ok(Configuration { config })
    }

    // ========================================================================
    // Stores
    // ========================================================================

    pub fn store_count(&self) -> anyhow::Result<usize> {
        let count = self.get_u64(STORES_COUNT, DEFAULT_STORE_COUNT as u64)?;
        if count == 0 {
            bail!("{} must be at least 1", STORES_COUNT);
        }
        Ok(count as usize)
    }

    // ========================================================================
    // Lock manager
    // ========================================================================

    pub fn lock_manager_config(&self) -> anyhow::Result<LockManagerConfig> {
        let defaults = RetryPolicy::default();

        let retry_count = self.get_u64(LOCK_RETRY_COUNT, defaults.retry_count as u64)?;
        let retry_count = u32::try_from(retry_count)
            .map_err(|_| anyhow!("{} is out of range: {}", LOCK_RETRY_COUNT, retry_count))?;
        let retry_delay_ms = self.get_u64(LOCK_RETRY_DELAY_MS, defaults.retry_delay_ms)?;
        let jitter = self.get_f64(LOCK_RETRY_JITTER, defaults.jitter)?;

        let retry =
            RetryPolicy::new(retry_count, Duration::from_millis(retry_delay_ms)).with_jitter(jitter);

        let fencing = match self.config.get_string(LOCK_FENCING) {
            Ok(value) => parse_fencing(&value)?,
            Err(_) => FencingMode::Disabled,
        };

        Ok(LockManagerConfig::default()
            .with_retry(retry)
            .with_clock_drift_factor(self.get_f64(LOCK_CLOCK_DRIFT_FACTOR, DEFAULT_CLOCK_DRIFT_FACTOR)?)
            .with_connect_timeout(Duration::from_millis(
                self.get_u64(LOCK_CONNECT_TIMEOUT_MS, DEFAULT_CONNECT_TIMEOUT_MS)?,
            ))
            .with_default_validity(Duration::from_millis(
                self.get_u64(LOCK_DEFAULT_VALIDITY_MS, DEFAULT_VALIDITY_MS)?,
            ))
            .with_fencing(fencing))
    }

    // ========================================================================
    // Logging
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.config.get_string(LOG_DIR).ok().map(PathBuf::from),
            self.config.get_bool(LOG_CONSOLE).unwrap_or(true),
            self.config.get_bool(LOG_FILE).unwrap_or(false),
            self.config
                .get_string(LOG_LEVEL)
                .unwrap_or_else(|_| "info".to_string()),
        )
    }

    fn get_u64(&self, key: &str, default: u64) -> anyhow::Result<u64> {
        match self.config.get_int(key) {
            Ok(v) => u64::try_from(v).map_err(|_| anyhow!("{} must not be negative: {}", key, v)),
            Err(config::ConfigError::NotFound(_)) => Ok(default),
            Err(e) => Err(e).with_context(|| format!("Invalid value for {}", key)),
        }
    }

    fn get_f64(&self, key: &str, default: f64) -> anyhow::Result<f64> {
        match self.config.get_float(key) {
            Ok(v) => Ok(v),
            Err(config::ConfigError::NotFound(_)) => Ok(default),
            Err(e) => Err(e).with_context(|| format!("Invalid value for {}", key)),
        }
    }
}

/// Parse `disabled`, `local` or `store:<index>`
pub fn parse_fencing(value: &str) -> anyhow::Result<FencingMode> {
    let value = value.trim().to_lowercase();
    match value.as_str() {
        "" | "disabled" | "none" | "false" => Ok(FencingMode::Disabled),
        "local" | "true" => Ok(FencingMode::Local),
        other => match other.strip_prefix("store:") {
            Some(index) => index
                .parse()
                .map(FencingMode::Store)
                .with_context(|| format!("Invalid fencing store index: {}", index)),
            None => bail!("Unknown fencing mode: {}", other),
        },
    }
}
