// `quorlock contend`: concurrent clients competing for one lock name
// Each client owns a separate manager over the shared stores, as separate
// processes would. The report counts how many clients were ever inside the
// critical section at the same time.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::bail;
use futures::future::try_join_all;
use quorlock_core::{FencedResource, FencingMode, LockError, LockManager, LockOptions, LockStats};
use serde::Serialize;
use tracing::{debug, info};

use super::Cluster;
use crate::cli::ContendArgs;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContendReport {
    pub name: String,
    pub stores: usize,
    pub quorum: usize,
    pub clients: usize,
    pub rounds: usize,
    pub acquired: u64,
    pub failed: u64,
    /// Highest number of simultaneous holders observed; 1 when exclusive
    pub max_concurrent_holders: usize,
    /// Writes rejected by the fenced resource
    pub stale_writes: u64,
    pub elapsed_ms: u64,
    pub stats: LockStats,
}

#[derive(Default)]
struct CriticalSection {
    inside: AtomicUsize,
    max_inside: AtomicUsize,
}

impl CriticalSection {
    fn enter(&self) {
        let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_inside.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.inside.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ClientOutcome {
    acquired: u64,
    failed: u64,
    stale_writes: u64,
    stats: LockStats,
}

pub async fn contend(cluster: &Cluster, args: &ContendArgs) -> anyhow::Result<ContendReport> {
    if cluster.config.fencing == FencingMode::Local {
        bail!("contend runs one manager per client; use store fencing instead of local");
    }

    let section = Arc::new(CriticalSection::default());
    let resource = Arc::new(FencedResource::new(0u64));
    let start = Instant::now();

    let mut handles = Vec::with_capacity(args.clients);
    for client in 0..args.clients {
        let manager = cluster.manager()?;
        let section = section.clone();
        let resource = resource.clone();
        let args = args.clone();
        handles.push(tokio::spawn(async move {
            run_client(client, manager, &args, &section, &resource).await
        }));
    }

    let outcomes = try_join_all(handles).await?;

    let mut report = ContendReport {
        name: args.name.clone(),
        stores: cluster.stores.len(),
        quorum: quorlock_core::quorum_for(cluster.stores.len()),
        clients: args.clients,
        rounds: args.rounds,
        max_concurrent_holders: section.max_inside.load(Ordering::SeqCst),
        elapsed_ms: start.elapsed().as_millis() as u64,
        ..Default::default()
    };
    for outcome in outcomes {
        let outcome = outcome?;
        report.acquired += outcome.acquired;
        report.failed += outcome.failed;
        report.stale_writes += outcome.stale_writes;
        merge_stats(&mut report.stats, &outcome.stats);
    }

    info!(
        name = %report.name,
        acquired = report.acquired,
        failed = report.failed,
        max_concurrent_holders = report.max_concurrent_holders,
        "Contention run finished"
    );
    Ok(report)
}

async fn run_client(
    client: usize,
    manager: LockManager,
    args: &ContendArgs,
    section: &CriticalSection,
    resource: &FencedResource<u64>,
) -> anyhow::Result<ClientOutcome> {
    let mut outcome = ClientOutcome::default();
    let work = Duration::from_millis(args.work_ms);

    for round in 0..args.rounds {
        let lock = match manager.lock(&args.name, LockOptions::new()).await {
            Ok(lock) => lock,
            Err(LockError::AcquireFailed { .. } | LockError::ClockDriftExceeded { .. }) => {
                debug!(client = client, round = round, "Gave up on this round");
                outcome.failed += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        section.enter();
        if let Some(fence) = lock.fence_token()
            && resource.write(fence, |value| *value = fence).is_err()
        {
            outcome.stale_writes += 1;
        }
        tokio::time::sleep(work).await;
        section.leave();

        outcome.acquired += 1;
        if let Err(e) = manager.unlock(&lock).await {
            // The next holder waits for the key to expire
            debug!(client = client, round = round, error = %e, "Lock not released by a quorum");
        }
    }

    outcome.stats = manager.stats();
    Ok(outcome)
}

fn merge_stats(total: &mut LockStats, other: &LockStats) {
    total.attempts += other.attempts;
    total.acquisitions += other.acquisitions;
    total.failed_acquisitions += other.failed_acquisitions;
    total.drift_aborts += other.drift_aborts;
    total.releases += other.releases;
    total.failed_releases += other.failed_releases;
    total.extensions += other.extensions;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_section_tracks_peak() {
        let section = CriticalSection::default();
        section.enter();
        section.enter();
        section.leave();
        section.enter();
        section.leave();
        section.leave();

        assert_eq!(section.inside.load(Ordering::SeqCst), 0);
        assert_eq!(section.max_inside.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_merge_stats() {
        let mut total = LockStats::default();
        let one = LockStats {
            attempts: 3,
            acquisitions: 1,
            releases: 1,
            ..Default::default()
        };
        merge_stats(&mut total, &one);
        merge_stats(&mut total, &one);

        assert_eq!(total.attempts, 6);
        assert_eq!(total.acquisitions, 2);
        assert_eq!(total.releases, 2);
    }
}
