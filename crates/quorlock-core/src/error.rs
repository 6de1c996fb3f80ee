//! Error types for the quorum lock manager

use std::time::Duration;

/// Error returned by lock manager operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock name must not be empty")]
    InvalidName,

    #[error("lock validity must be positive and within the representable time range")]
    InvalidValidity,

    #[error("invalid lock manager configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to acquire lock '{name}' after {attempts} attempt(s)")]
    AcquireFailed { name: String, attempts: u32 },

    #[error("clock drift exceeded while acquiring '{name}': elapsed {elapsed:?}, limit {limit:?}")]
    ClockDriftExceeded {
        name: String,
        elapsed: Duration,
        limit: Duration,
    },

    #[error("failed to release lock '{name}': released on {released} store(s), quorum is {quorum}")]
    ReleaseFailed {
        name: String,
        released: usize,
        quorum: usize,
    },

    #[error("failed to extend lock '{name}': extended on {extended} store(s), quorum is {quorum}")]
    ExtendFailed {
        name: String,
        extended: usize,
        quorum: usize,
    },

    #[error("lock '{name}' has expired")]
    LockExpired { name: String },

    #[error("acquisition of '{name}' was cancelled")]
    Cancelled { name: String },

    #[error("deadline exceeded while acquiring '{name}'")]
    DeadlineExceeded { name: String },

    #[error("stale fencing token {presented}, last accepted is {current}")]
    StaleFencingToken { presented: u64, current: u64 },
}

/// Error reported by a single lock store.
///
/// The manager never surfaces these to callers; a failing store is a non-vote.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation not supported by store: {0}")]
    Unsupported(&'static str),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LockError>;
