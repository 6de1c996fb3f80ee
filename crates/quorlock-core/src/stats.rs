// Lock manager statistics
// Counters are informational only and never consulted by the protocol

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};

pub const METRIC_ATTEMPTS: &str = "quorlock_lock_attempts_total";
pub const METRIC_ACQUIRED: &str = "quorlock_lock_acquired_total";
pub const METRIC_FAILED: &str = "quorlock_lock_failed_total";
pub const METRIC_RELEASED: &str = "quorlock_lock_released_total";
pub const METRIC_ACQUIRE_DURATION: &str = "quorlock_lock_acquire_duration_seconds";

/// Snapshot of lock manager statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStats {
    /// Acquisition attempts, each retry counted separately
    pub attempts: u64,
    /// Successful acquisitions
    pub acquisitions: u64,
    /// `lock` calls that ended without a lock
    pub failed_acquisitions: u64,
    /// Calls aborted because an attempt exceeded the drift limit
    pub drift_aborts: u64,
    /// Successful quorum releases
    pub releases: u64,
    /// Releases that did not reach quorum
    pub failed_releases: u64,
    /// Successful extensions
    pub extensions: u64,
}

#[derive(Debug, Default)]
pub(crate) struct LockStatsCollector {
    attempts: AtomicU64,
    acquisitions: AtomicU64,
    failed_acquisitions: AtomicU64,
    drift_aborts: AtomicU64,
    releases: AtomicU64,
    failed_releases: AtomicU64,
    extensions: AtomicU64,
}

impl LockStatsCollector {
    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_ATTEMPTS).increment(1);
    }

    pub fn record_acquired(&self, elapsed: Duration) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_ACQUIRED).increment(1);
        histogram!(METRIC_ACQUIRE_DURATION).record(elapsed.as_secs_f64());
    }

    pub fn record_failed(&self, reason: &'static str) {
        self.failed_acquisitions.fetch_add(1, Ordering::Relaxed);
        if reason == "clock_drift" {
            self.drift_aborts.fetch_add(1, Ordering::Relaxed);
        }
        counter!(METRIC_FAILED, "reason" => reason).increment(1);
    }

    pub fn record_release(&self, success: bool) {
        if success {
            self.releases.fetch_add(1, Ordering::Relaxed);
            counter!(METRIC_RELEASED).increment(1);
        } else {
            self.failed_releases.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_extension(&self) {
        self.extensions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LockStats {
        LockStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            failed_acquisitions: self.failed_acquisitions.load(Ordering::Relaxed),
            drift_aborts: self.drift_aborts.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            failed_releases: self.failed_releases.load(Ordering::Relaxed),
            extensions: self.extensions.load(Ordering::Relaxed),
        }
    }
}
