//! Lock entity returned to a successful caller

use std::time::{Duration, Instant};

/// An acquired distributed lock.
///
/// Immutable once returned. It is authoritative only while
/// `now < acquired_at + validity`; the stores expire the key on their own
/// after the requested TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    name: String,
    token: String,
    validity: Duration,
    acquired_at: Instant,
    acquired_at_ms: i64,
    attempts: u32,
    fence_token: Option<u64>,
}

impl Lock {
    /// Build a lock handle stamped with the current time.
    ///
    /// The manager calls this on success; callers may use it to rebuild a
    /// handle received from another process, e.g. to release it.
    pub fn new(
        name: impl Into<String>,
        token: impl Into<String>,
        validity: Duration,
        attempts: u32,
        fence_token: Option<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            token: token.into(),
            validity,
            acquired_at: Instant::now(),
            acquired_at_ms: chrono::Utc::now().timestamp_millis(),
            attempts,
            fence_token,
        }
    }

    /// Resource name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque token proving ownership on the stores
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Remaining validity at the moment of acquisition, after subtracting the
    /// time spent acquiring and the drift margin
    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Monotonic acquisition instant
    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    /// Wall-clock acquisition time in Unix milliseconds
    pub fn acquired_at_ms(&self) -> i64 {
        self.acquired_at_ms
    }

    /// Attempt number (1-based) that succeeded
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Monotonic fencing token, when fencing is enabled
    pub fn fence_token(&self) -> Option<u64> {
        self.fence_token
    }

    /// End of the validity window; `None` when it lies beyond what `Instant`
    /// can represent, in which case the lock never expires locally
    pub fn expires_at(&self) -> Option<Instant> {
        self.acquired_at.checked_add(self.validity)
    }

    /// Validity left right now; zero once expired
    pub fn remaining(&self) -> Duration {
        match self.expires_at() {
            Some(expires_at) => expires_at.saturating_duration_since(Instant::now()),
            None => self.validity.saturating_sub(self.acquired_at.elapsed()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at()
            .is_none_or(|expires_at| Instant::now() < expires_at)
    }

    pub fn is_expired(&self) -> bool {
        !self.is_valid()
    }
}
