//! Acquisition token generation
//!
//! A token is the capability that proves ownership of a lock on every store,
//! so two concurrent attempts must never share one. Tokens combine:
//! - a per-generator node component (random nonce or explicit node id), which
//!   keeps generators in different processes apart
//! - the wall clock in nanoseconds
//! - a generator-local atomic counter, which keeps attempts within one
//!   generator apart even when the clock does not advance

use std::sync::atomic::{AtomicU64, Ordering};

/// Produces unique opaque tokens, one per acquisition attempt
#[derive(Debug)]
pub struct TokenGenerator {
    node: String,
    counter: AtomicU64,
}

impl TokenGenerator {
    /// Create a generator with a random 64-bit node nonce
    pub fn new() -> Self {
        let nonce: [u8; 8] = rand::random();
        Self {
            node: const_hex::encode(nonce),
            counter: AtomicU64::new(0),
        }
    }

    /// Create a generator with an explicit node identifier.
    ///
    /// The caller is responsible for the identifier being unique across the
    /// cluster.
    pub fn with_node_id(node_id: impl Into<String>) -> Self {
        Self {
            node: node_id.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// The node component embedded in every token
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Generate a fresh token
    pub fn next(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default();
        format!("{}-{:x}-{:x}", self.node, nanos, seq)
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}
