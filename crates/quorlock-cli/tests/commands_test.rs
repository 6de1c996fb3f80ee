//! End-to-end runs of the lock and contend commands

use std::time::Duration;

use quorlock_cli::commands::{Cluster, contend, lock, memory_stores};
use quorlock_cli::{ContendArgs, LockArgs};
use quorlock_core::{FencingMode, LockManagerConfig, RetryPolicy};

fn cluster(store_count: usize, config: LockManagerConfig) -> Cluster {
    Cluster {
        stores: memory_stores(store_count),
        config,
    }
}

fn patient_config() -> LockManagerConfig {
    LockManagerConfig::default()
        .with_retry(RetryPolicy::new(200, Duration::from_millis(5)))
        .with_fencing(FencingMode::Store(0))
}

#[tokio::test]
async fn test_lock_command_holds_and_releases() {
    let cluster = cluster(3, LockManagerConfig::default());
    let args = LockArgs {
        name: "report".to_string(),
        validity_ms: Some(2000),
        hold_ms: 10,
    };

    let report = lock(&cluster, &args).await.unwrap();

    assert_eq!(report.name, "report");
    assert_eq!(report.stores, 3);
    assert_eq!(report.quorum, 2);
    assert_eq!(report.attempts, 1);
    assert!(report.validity_ms > 1900 && report.validity_ms <= 1980);
    assert!(report.valid_after_hold);
    assert!(report.released);
    assert_eq!(report.stats.acquisitions, 1);
    assert_eq!(report.stats.releases, 1);

    // The name is free again for a new manager over the same stores
    let again = lock(&cluster, &args).await.unwrap();
    assert_eq!(again.attempts, 1);
    assert_ne!(again.token, report.token);
}

#[tokio::test]
async fn test_lock_command_reports_expired_hold() {
    let cluster = cluster(3, LockManagerConfig::default());
    let args = LockArgs {
        name: "short".to_string(),
        validity_ms: Some(30),
        hold_ms: 60,
    };

    let report = lock(&cluster, &args).await.unwrap();

    assert!(!report.valid_after_hold);
    assert!(!report.released);
    assert_eq!(report.stats.failed_releases, 1);
}

#[tokio::test]
async fn test_lock_command_with_fencing() {
    let config = LockManagerConfig::default().with_fencing(FencingMode::Store(0));
    let cluster = cluster(3, config);
    let args = LockArgs {
        name: "fenced".to_string(),
        validity_ms: None,
        hold_ms: 0,
    };

    let first = lock(&cluster, &args).await.unwrap();
    let second = lock(&cluster, &args).await.unwrap();

    assert_eq!(first.fence_token, Some(1));
    assert_eq!(second.fence_token, Some(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_contend_is_mutually_exclusive() {
    let cluster = cluster(5, patient_config());
    let args = ContendArgs {
        name: "shared".to_string(),
        clients: 6,
        rounds: 5,
        work_ms: 2,
    };

    let report = contend(&cluster, &args).await.unwrap();

    assert_eq!(report.clients, 6);
    assert_eq!(report.quorum, 3);
    assert_eq!(report.max_concurrent_holders, 1);
    assert_eq!(report.acquired + report.failed, 30);
    assert!(report.acquired > 0);
    assert_eq!(report.stats.acquisitions, report.acquired);
    // Store-issued fences increase with every holder
    assert_eq!(report.stale_writes, 0);
}

#[tokio::test]
async fn test_contend_rejects_local_fencing() {
    let config = LockManagerConfig::default().with_fencing(FencingMode::Local);
    let cluster = cluster(3, config);
    let args = ContendArgs {
        name: "shared".to_string(),
        clients: 2,
        rounds: 1,
        work_ms: 0,
    };

    let result = contend(&cluster, &args).await;

    let err = result.unwrap_err().to_string();
    assert!(err.contains("store fencing"), "unexpected error: {}", err);
}
