//! Lock store contract
//!
//! A lock store is one independent replica holding `key -> token` entries with
//! TTL expiry. The manager only relies on the atomic conditional primitives
//! declared here; how a store realizes them (Lua script, transaction, CAS) is
//! up to the implementation.

mod memory;

pub use memory::MemoryStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Atomic primitives a store must provide to take part in the quorum
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Label used in logs
    fn id(&self) -> &str;

    /// Set `key = token` with expiry `ttl` only if `key` is absent or expired.
    ///
    /// Returns whether the write happened. Must be atomic with respect to
    /// concurrent callers on the same store.
    async fn acquire_if_absent(&self, key: &str, token: &str, ttl: Duration) -> StoreResult<bool>;

    /// Delete `key` only if its current value equals `token`.
    async fn release_if_matches(&self, key: &str, token: &str) -> StoreResult<bool>;

    /// Reset the expiry of `key` to `ttl` only if its current, unexpired value
    /// equals `token`.
    async fn extend_if_matches(&self, key: &str, token: &str, ttl: Duration) -> StoreResult<bool>;

    /// Current unexpired value of `key`
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Next value of a per-key monotonic counter, independent of the lock entry
    async fn next_fence(&self, _key: &str) -> StoreResult<u64> {
        Err(StoreError::Unsupported("next_fence"))
    }
}
