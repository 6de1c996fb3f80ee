// In-memory lock store
// Conditional writes are performed under the DashMap shard lock of the key

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use super::{LockStore, StoreResult};

/// A stored lock entry
#[derive(Debug, Clone)]
pub(crate) struct LockEntry {
    token: String,
    written_at: Instant,
    ttl: Duration,
}

impl LockEntry {
    fn new(token: &str, ttl: Duration) -> Self {
        Self {
            token: token.to_string(),
            written_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.written_at.elapsed() >= self.ttl
    }
}

/// Single-replica lock store backed by `DashMap`
pub struct MemoryStore {
    id: String,
    pub(crate) locks: Arc<DashMap<String, LockEntry>>,
    fences: DashMap<String, u64>,
    cleanup_handle: Option<tokio::task::JoinHandle<()>>,
}

impl MemoryStore {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locks: Arc::new(DashMap::new()),
            fences: DashMap::new(),
            cleanup_handle: None,
        }
    }

    /// Start a background task that drops expired entries.
    ///
    /// Must be called from within a Tokio runtime. Expired entries are
    /// already invisible to every operation; the sweep only reclaims memory.
    pub fn with_cleanup(mut self, interval: Duration) -> Self {
        let locks = self.locks.clone();
        let id = self.id.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let before = locks.len();
                locks.retain(|_, entry| !entry.is_expired());
                let removed = before.saturating_sub(locks.len());
                if removed > 0 {
                    debug!(store = %id, count = removed, "Cleaned up expired lock entries");
                }
            }
        });

        self.cleanup_handle = Some(handle);
        self
    }

    /// Number of unexpired keys currently held
    pub fn held_count(&self) -> usize {
        self.locks.iter().filter(|e| !e.value().is_expired()).count()
    }

    /// Whether `key` is held by an unexpired entry
    pub fn contains(&self, key: &str) -> bool {
        self.locks
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        if let Some(handle) = self.cleanup_handle.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    fn id(&self) -> &str {
        &self.id
    }

    async fn acquire_if_absent(&self, key: &str, token: &str, ttl: Duration) -> StoreResult<bool> {
        let acquired = match self.locks.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(LockEntry::new(token, ttl));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(LockEntry::new(token, ttl));
                true
            }
        };

        if acquired {
            debug!(store = %self.id, key = %key, "Lock acquired");
        }
        Ok(acquired)
    }

    async fn release_if_matches(&self, key: &str, token: &str) -> StoreResult<bool> {
        let released = self
            .locks
            .remove_if(key, |_, entry| entry.token == token && !entry.is_expired())
            .is_some();

        if released {
            debug!(store = %self.id, key = %key, "Lock released");
        }
        Ok(released)
    }

    async fn extend_if_matches(&self, key: &str, token: &str, ttl: Duration) -> StoreResult<bool> {
        match self.locks.get_mut(key) {
            Some(mut entry) if entry.token == token && !entry.is_expired() => {
                entry.written_at = Instant::now();
                entry.ttl = ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self
            .locks
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.token.clone()))
    }

    async fn next_fence(&self, key: &str) -> StoreResult<u64> {
        let mut counter = self.fences.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
