//! Command line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_CONFIG_FILE: &str = "conf/quorlock.yml";

/// Drive a quorum lock manager over in-process lock stores
#[derive(Debug, Parser)]
#[command(name = "quorlock", version, about)]
pub struct Cli {
    /// Configuration file; skipped when missing
    #[arg(short = 'c', long = "config", global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
    /// Number of lock stores (overrides `stores.count`)
    #[arg(short = 's', long = "stores", global = true)]
    pub stores: Option<usize>,
    /// Log level (overrides `log.level`)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Acquire a lock, hold it, then release it
    Lock(LockArgs),
    /// Run many concurrent clients against one lock name
    Contend(ContendArgs),
}

#[derive(Debug, Clone, Args)]
pub struct LockArgs {
    /// Lock name
    #[arg(short = 'n', long = "name", default_value = "quorlock")]
    pub name: String,
    /// Requested validity; defaults to `lock.default_validity_ms`
    #[arg(long = "validity-ms")]
    pub validity_ms: Option<u64>,
    /// How long to hold the lock before releasing it
    #[arg(long = "hold-ms", default_value_t = 100)]
    pub hold_ms: u64,
}

#[derive(Debug, Clone, Args)]
pub struct ContendArgs {
    /// Lock name
    #[arg(short = 'n', long = "name", default_value = "quorlock")]
    pub name: String,
    /// Concurrent clients, each with its own manager
    #[arg(long = "clients", default_value_t = 8)]
    pub clients: usize,
    /// Acquisitions attempted by each client
    #[arg(long = "rounds", default_value_t = 10)]
    pub rounds: usize,
    /// Time spent inside the critical section per acquisition
    #[arg(long = "work-ms", default_value_t = 2)]
    pub work_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lock_defaults() {
        let cli = Cli::try_parse_from(["quorlock", "lock"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(cli.stores.is_none());
        match cli.command {
            Command::Lock(args) => {
                assert_eq!(args.name, "quorlock");
                assert_eq!(args.hold_ms, 100);
                assert!(args.validity_ms.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "quorlock",
            "contend",
            "--clients",
            "4",
            "--stores",
            "5",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.stores, Some(5));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Contend(args) => {
                assert_eq!(args.clients, 4);
                assert_eq!(args.rounds, 10);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["quorlock"]).is_err());
    }
}
