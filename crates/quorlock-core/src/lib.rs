//! Quorlock Core - distributed mutual exclusion over independent lock stores
//!
//! This crate provides:
//! - The lock store contract and an in-memory reference store
//! - A quorum lock manager implementing the Redlock algorithm
//! - Unique acquisition tokens and fencing tokens
//! - Retry policy, cancellation and statistics

pub mod cancel;
pub mod config;
pub mod error;
pub mod fencing;
pub mod lock;
pub mod manager;
pub mod retry;
pub mod stats;
pub mod store;
pub mod token;

// Re-export commonly used types
pub use cancel::{CancelHandle, CancelSignal};
pub use config::{FencingMode, LockManagerConfig, quorum_for};
pub use error::{LockError, Result, StoreError};
pub use fencing::{FencedResource, LocalFenceSequence};
pub use lock::Lock;
pub use manager::{LockManager, LockOptions};
pub use retry::RetryPolicy;
pub use stats::LockStats;
pub use store::{LockStore, MemoryStore, StoreResult};
pub use token::TokenGenerator;
