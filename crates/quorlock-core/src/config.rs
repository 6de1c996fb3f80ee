//! Lock manager configuration and quorum arithmetic

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LockError, Result};
use crate::retry::RetryPolicy;

pub const DEFAULT_CLOCK_DRIFT_FACTOR: f64 = 0.01;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_VALIDITY_MS: u64 = 1000;

/// Minimum number of agreeing stores for `store_count` replicas
pub fn quorum_for(store_count: usize) -> usize {
    store_count / 2 + 1
}

/// Millisecond fields round sub-millisecond remainders up so a non-zero
/// duration never becomes zero
fn millis_ceil(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

/// Source of fencing tokens for successful acquisitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FencingMode {
    /// No fencing token is attached
    #[default]
    Disabled,
    /// Per-name sequence kept by the manager; monotonic within one manager.
    /// Tokens from different managers are not comparable, so a resource
    /// shared by several managers needs `Store`
    Local,
    /// Per-name sequence issued by the store at this index
    Store(usize),
}

/// Lock manager configuration. Fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockManagerConfig {
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Fraction of the validity reserved as clock drift margin
    #[serde(default = "default_clock_drift_factor")]
    pub clock_drift_factor: f64,
    /// Per-store operation timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Validity used when the caller does not give one, in milliseconds
    #[serde(default = "default_validity")]
    pub default_validity_ms: u64,
    #[serde(default)]
    pub fencing: FencingMode,
}

fn default_clock_drift_factor() -> f64 {
    DEFAULT_CLOCK_DRIFT_FACTOR
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_validity() -> u64 {
    DEFAULT_VALIDITY_MS
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            clock_drift_factor: DEFAULT_CLOCK_DRIFT_FACTOR,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            default_validity_ms: DEFAULT_VALIDITY_MS,
            fencing: FencingMode::Disabled,
        }
    }
}

impl LockManagerConfig {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_clock_drift_factor(mut self, factor: f64) -> Self {
        self.clock_drift_factor = factor;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = millis_ceil(timeout);
        self
    }

    pub fn with_default_validity(mut self, validity: Duration) -> Self {
        self.default_validity_ms = millis_ceil(validity);
        self
    }

    pub fn with_fencing(mut self, fencing: FencingMode) -> Self {
        self.fencing = fencing;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn default_validity(&self) -> Duration {
        Duration::from_millis(self.default_validity_ms)
    }

    /// Drift margin subtracted from `validity`
    pub fn drift_margin(&self, validity: Duration) -> Duration {
        let nanos = (validity.as_nanos() as f64 * self.clock_drift_factor).round();
        Duration::from_nanos(nanos as u64)
    }

    /// Longest an attempt may take before the lock it obtains would be worthless
    pub fn drift_limit(&self, validity: Duration) -> Duration {
        validity.saturating_sub(self.drift_margin(validity))
    }

    /// Check the configuration against `store_count` replicas
    pub fn validate(&self, store_count: usize) -> Result<()> {
        if store_count == 0 {
            return Err(LockError::InvalidConfig(
                "at least one store is required".to_string(),
            ));
        }
        if self.retry.retry_count == 0 {
            return Err(LockError::InvalidConfig(
                "retry_count must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.clock_drift_factor) {
            return Err(LockError::InvalidConfig(format!(
                "clock_drift_factor must be in [0, 1), got {}",
                self.clock_drift_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(LockError::InvalidConfig(format!(
                "jitter must be in [0, 1], got {}",
                self.retry.jitter
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(LockError::InvalidConfig(
                "connect_timeout_ms must be positive".to_string(),
            ));
        }
        if self.default_validity_ms == 0 {
            return Err(LockError::InvalidConfig(
                "default_validity_ms must be positive".to_string(),
            ));
        }
        if let FencingMode::Store(index) = self.fencing
            && index >= store_count
        {
            return Err(LockError::InvalidConfig(format!(
                "fencing store index {} out of range for {} store(s)",
                index, store_count
            )));
        }
        Ok(())
    }
}
