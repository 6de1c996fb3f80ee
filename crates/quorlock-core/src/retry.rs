//! Retry/backoff policy for acquisition attempts

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How acquisition attempts are repeated.
///
/// The delay between attempts is constant and jittered symmetrically so that
/// contenders which failed together do not retry in lockstep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of acquisition attempts
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Base delay between attempts in milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Jitter factor (0.0 to 1.0)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_retry_count() -> u32 {
    10
}

fn default_retry_delay() -> u64 {
    200
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: 10,
            retry_delay_ms: 200,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn new(retry_count: u32, retry_delay: Duration) -> Self {
        Self {
            retry_count,
            retry_delay_ms: retry_delay.as_millis() as u64,
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Largest delay `calculate_delay` can return
    pub fn max_delay(&self) -> Duration {
        let base = self.retry_delay_ms as f64;
        Duration::from_millis((base + base * self.jitter.clamp(0.0, 1.0)) as u64)
    }

    /// Jittered delay to wait before the next attempt
    pub fn calculate_delay(&self) -> Duration {
        let base = self.retry_delay_ms as f64;
        let jitter_range = base * self.jitter.clamp(0.0, 1.0);
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
        let final_delay = (base + jitter).max(0.0) as u64;

        Duration::from_millis(final_delay)
    }
}
