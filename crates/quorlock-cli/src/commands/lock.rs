// `quorlock lock`: acquire, hold, release

use std::time::Duration;

use quorlock_core::{LockOptions, LockStats};
use serde::Serialize;
use tracing::info;

use super::Cluster;
use crate::cli::LockArgs;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockReport {
    pub name: String,
    pub token: String,
    pub stores: usize,
    pub quorum: usize,
    pub attempts: u32,
    pub validity_ms: u64,
    pub acquired_at_ms: i64,
    pub fence_token: Option<u64>,
    /// Whether the lock was still valid when the hold ended
    pub valid_after_hold: bool,
    pub released: bool,
    pub stats: LockStats,
}

pub async fn lock(cluster: &Cluster, args: &LockArgs) -> anyhow::Result<LockReport> {
    let manager = cluster.manager()?;

    let mut options = LockOptions::new();
    if let Some(validity_ms) = args.validity_ms {
        options = options.with_validity(Duration::from_millis(validity_ms));
    }

    let lock = manager.lock(&args.name, options).await?;
    info!(
        name = %lock.name(),
        attempts = lock.attempts(),
        validity_ms = lock.validity().as_millis() as u64,
        hold_ms = args.hold_ms,
        "Holding lock"
    );

    tokio::time::sleep(Duration::from_millis(args.hold_ms)).await;
    let valid_after_hold = lock.is_valid();

    let released = match manager.unlock(&lock).await {
        Ok(()) => true,
        Err(e) => {
            // Expected when the hold outlived the validity
            info!(name = %lock.name(), error = %e, "Lock not released by a quorum");
            false
        }
    };

    Ok(LockReport {
        name: lock.name().to_string(),
        token: lock.token().to_string(),
        stores: manager.store_count(),
        quorum: manager.quorum(),
        attempts: lock.attempts(),
        validity_ms: lock.validity().as_millis() as u64,
        acquired_at_ms: lock.acquired_at_ms(),
        fence_token: lock.fence_token(),
        valid_after_hold,
        released,
        stats: manager.stats(),
    })
}
