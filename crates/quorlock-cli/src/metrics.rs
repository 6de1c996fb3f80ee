// Metric descriptions for the lock manager
// The manager records these through the `metrics` facade; an exporter can be
// installed by the embedding process

use metrics::{describe_counter, describe_histogram};
use quorlock_core::stats::{
    METRIC_ACQUIRE_DURATION, METRIC_ACQUIRED, METRIC_ATTEMPTS, METRIC_FAILED, METRIC_RELEASED,
};

/// Initialize all metric descriptions
/// Should be called once at application startup
pub fn init_metrics() {
    describe_counter!(
        METRIC_ATTEMPTS,
        "Total number of lock acquisition attempts, each retry counted"
    );
    describe_counter!(METRIC_ACQUIRED, "Total number of locks acquired");
    describe_counter!(
        METRIC_FAILED,
        "Total number of lock calls that ended without a lock, by reason"
    );
    describe_counter!(METRIC_RELEASED, "Total number of locks released with a quorum");
    describe_histogram!(
        METRIC_ACQUIRE_DURATION,
        "Duration of successful acquisition attempts in seconds"
    );

    tracing::info!("Metrics initialized");
}
