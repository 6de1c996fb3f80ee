//! Fencing tokens
//!
//! A fencing token is a monotonically increasing integer attached to each
//! successful acquisition of a name. A downstream resource remembers the
//! highest token it accepted and rejects anything not strictly greater, so a
//! holder that stalled past its lease cannot overwrite the work of the next
//! holder.

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{LockError, Result};

/// Per-name sequence kept by one lock manager
#[derive(Debug, Default)]
pub struct LocalFenceSequence {
    sequences: DashMap<String, u64>,
}

impl LocalFenceSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next token for `name`
    pub fn next(&self, name: &str) -> u64 {
        let mut seq = self.sequences.entry(name.to_string()).or_insert(0);
        *seq += 1;
        *seq
    }

    /// Last issued token for `name`, 0 if none
    pub fn current(&self, name: &str) -> u64 {
        self.sequences.get(name).map(|seq| *seq).unwrap_or(0)
    }
}

/// A downstream resource that only accepts writes carrying a fresh fencing token
#[derive(Debug)]
pub struct FencedResource<T> {
    inner: Mutex<Fenced<T>>,
}

#[derive(Debug)]
struct Fenced<T> {
    last_accepted: u64,
    value: T,
}

impl<T> FencedResource<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Fenced {
                last_accepted: 0,
                value,
            }),
        }
    }

    /// Highest fencing token accepted so far
    pub fn last_accepted(&self) -> u64 {
        self.inner.lock().last_accepted
    }

    /// Apply `f` if `fence` is strictly greater than every token accepted before.
    ///
    /// The check and the write happen under one mutex, so two writers can
    /// never both pass with the same token.
    pub fn write<R>(&self, fence: u64, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut guard = self.inner.lock();
        if fence <= guard.last_accepted {
            return Err(LockError::StaleFencingToken {
                presented: fence,
                current: guard.last_accepted,
            });
        }
        guard.last_accepted = fence;
        Ok(f(&mut guard.value))
    }

    /// Read the current value without any fencing check
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.lock().value)
    }
}
