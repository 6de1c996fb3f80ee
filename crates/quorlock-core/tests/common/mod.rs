//! Shared test stores with injected faults

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quorlock_core::{
    LockManager, LockManagerConfig, LockStore, MemoryStore, RetryPolicy, StoreError, StoreResult,
};

/// A store that is never reachable
pub struct FailingStore {
    id: String,
}

impl FailingStore {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

#[async_trait]
impl LockStore for FailingStore {
    fn id(&self) -> &str {
        &self.id
    }

    async fn acquire_if_absent(&self, _key: &str, _token: &str, _ttl: Duration) -> StoreResult<bool> {
        Err(StoreError::Unavailable(format!("{} is down", self.id)))
    }

    async fn release_if_matches(&self, _key: &str, _token: &str) -> StoreResult<bool> {
        Err(StoreError::Unavailable(format!("{} is down", self.id)))
    }

    async fn extend_if_matches(&self, _key: &str, _token: &str, _ttl: Duration) -> StoreResult<bool> {
        Err(StoreError::Unavailable(format!("{} is down", self.id)))
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Err(StoreError::Unavailable(format!("{} is down", self.id)))
    }

    async fn next_fence(&self, _key: &str) -> StoreResult<u64> {
        Err(StoreError::Unavailable(format!("{} is down", self.id)))
    }
}

/// A memory store that answers every call after a fixed delay
pub struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(id: &str, delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(id),
            delay,
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl LockStore for SlowStore {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn acquire_if_absent(&self, key: &str, token: &str, ttl: Duration) -> StoreResult<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.acquire_if_absent(key, token, ttl).await
    }

    async fn release_if_matches(&self, key: &str, token: &str) -> StoreResult<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.release_if_matches(key, token).await
    }

    async fn extend_if_matches(&self, key: &str, token: &str, ttl: Duration) -> StoreResult<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.extend_if_matches(key, token, ttl).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn next_fence(&self, key: &str) -> StoreResult<u64> {
        tokio::time::sleep(self.delay).await;
        self.inner.next_fence(key).await
    }
}

/// `count` healthy memory stores
pub fn memory_stores(count: usize) -> Vec<Arc<MemoryStore>> {
    (0..count)
        .map(|i| Arc::new(MemoryStore::new(format!("mem-{}", i))))
        .collect()
}

/// Upcast concrete stores for the manager
pub fn as_dyn<S: LockStore + 'static>(stores: &[Arc<S>]) -> Vec<Arc<dyn LockStore>> {
    stores
        .iter()
        .map(|s| s.clone() as Arc<dyn LockStore>)
        .collect()
}

/// `count` unreachable stores
pub fn failing_stores(count: usize) -> Vec<Arc<dyn LockStore>> {
    (0..count)
        .map(|i| Arc::new(FailingStore::new(&format!("down-{}", i))) as Arc<dyn LockStore>)
        .collect()
}

/// Config with a short, deterministic retry loop
pub fn fast_config(retry_count: u32, retry_delay_ms: u64) -> LockManagerConfig {
    LockManagerConfig::default().with_retry(
        RetryPolicy::new(retry_count, Duration::from_millis(retry_delay_ms)).with_jitter(0.0),
    )
}

pub fn manager(stores: Vec<Arc<dyn LockStore>>, config: LockManagerConfig) -> LockManager {
    LockManager::with_config(stores, config).unwrap()
}

/// Number of memory stores still holding `key`
pub fn holders(stores: &[Arc<MemoryStore>], key: &str) -> usize {
    stores.iter().filter(|s| s.contains(key)).count()
}
