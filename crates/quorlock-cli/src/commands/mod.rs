//! Subcommands driving lock managers over in-process stores

pub mod contend;
pub mod lock;

use std::sync::Arc;
use std::time::Duration;

use quorlock_core::{LockManager, LockManagerConfig, LockStore, MemoryStore};
use serde::Serialize;

use crate::cli::Command;
use crate::config::Configuration;

pub use contend::{ContendReport, contend};
pub use lock::{LockReport, lock};

const STORE_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Independent in-memory stores with background expiry sweeps.
/// Must be called from within a Tokio runtime.
pub fn memory_stores(count: usize) -> Vec<Arc<dyn LockStore>> {
    (0..count)
        .map(|i| {
            Arc::new(MemoryStore::new(format!("store-{}", i)).with_cleanup(STORE_CLEANUP_INTERVAL))
                as Arc<dyn LockStore>
        })
        .collect()
}

/// Stores and manager settings resolved from the configuration
pub struct Cluster {
    pub stores: Vec<Arc<dyn LockStore>>,
    pub config: LockManagerConfig,
}

impl Cluster {
    pub fn from_configuration(configuration: &Configuration) -> anyhow::Result<Self> {
        Ok(Self {
            stores: memory_stores(configuration.store_count()?),
            config: configuration.lock_manager_config()?,
        })
    }

    /// A new manager sharing this cluster's stores
    pub fn manager(&self) -> anyhow::Result<LockManager> {
        Ok(LockManager::with_config(
            self.stores.clone(),
            self.config.clone(),
        )?)
    }
}

/// Run the selected subcommand and print its report as JSON on stdout
pub async fn run(command: &Command, configuration: &Configuration) -> anyhow::Result<()> {
    let cluster = Cluster::from_configuration(configuration)?;

    match command {
        Command::Lock(args) => print_report(&lock(&cluster, args).await?),
        Command::Contend(args) => {
            let report = contend(&cluster, args).await?;
            print_report(&report)?;
            if report.max_concurrent_holders > 1 {
                anyhow::bail!(
                    "Mutual exclusion violated: {} concurrent holders",
                    report.max_concurrent_holders
                );
            }
            Ok(())
        }
    }
}

fn print_report<T: Serialize>(report: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
