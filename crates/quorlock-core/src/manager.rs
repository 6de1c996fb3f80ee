//! Quorum lock manager (Redlock)
//!
//! Acquisition fans out a conditional write to every store, counts the
//! grants against a majority quorum and checks that the time spent acquiring
//! still leaves the lock with positive validity after the drift margin.
//! Failed attempts are always cleaned up on every store before retrying.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use crate::cancel::{CancelSignal, Interrupt, interrupted};
use crate::config::{FencingMode, LockManagerConfig, quorum_for};
use crate::error::{LockError, Result, StoreError};
use crate::fencing::LocalFenceSequence;
use crate::lock::Lock;
use crate::stats::{LockStats, LockStatsCollector};
use crate::store::{LockStore, StoreResult};
use crate::token::TokenGenerator;

/// Per-call acquisition options
#[derive(Debug, Clone, Default)]
pub struct LockOptions {
    /// Requested validity; the manager default applies when unset
    pub validity: Option<Duration>,
    /// Give up once this instant passes
    pub deadline: Option<Instant>,
    /// Give up once this signal fires
    pub cancel: Option<CancelSignal>,
}

impl LockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = Some(validity);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn interrupt(&self) -> Option<Interrupt> {
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return Some(Interrupt::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(Interrupt::Deadline);
        }
        None
    }
}

/// When a fan-out may stop collecting store responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FanOut {
    /// Stop as soon as the quorum is reached or can no longer be reached
    UntilDecided,
    /// Wait for every store (or its timeout)
    All,
}

/// Outcome of one acquisition attempt
enum Attempt {
    Acquired(Lock),
    Failed { elapsed: Duration },
    Interrupted(Interrupt),
}

/// Distributed lock manager over N independent stores
pub struct LockManager {
    stores: Vec<Arc<dyn LockStore>>,
    quorum: usize,
    config: LockManagerConfig,
    tokens: TokenGenerator,
    fences: LocalFenceSequence,
    stats: LockStatsCollector,
}

impl LockManager {
    /// Create a manager with the default configuration
    pub fn new(stores: Vec<Arc<dyn LockStore>>) -> Result<Self> {
        Self::with_config(stores, LockManagerConfig::default())
    }

    pub fn with_config(stores: Vec<Arc<dyn LockStore>>, config: LockManagerConfig) -> Result<Self> {
        config.validate(stores.len())?;

        let quorum = quorum_for(stores.len());
        info!(
            stores = stores.len(),
            quorum = quorum,
            retry_count = config.retry.retry_count,
            "LockManager initialized"
        );

        Ok(Self {
            stores,
            quorum,
            config,
            tokens: TokenGenerator::new(),
            fences: LocalFenceSequence::new(),
            stats: LockStatsCollector::default(),
        })
    }

    /// Replace the token generator, e.g. to embed a fixed node id
    pub fn with_token_generator(mut self, tokens: TokenGenerator) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    pub fn config(&self) -> &LockManagerConfig {
        &self.config
    }

    pub fn stats(&self) -> LockStats {
        self.stats.snapshot()
    }

    /// Acquire an exclusive lock on `name`
    pub async fn lock(&self, name: &str, options: LockOptions) -> Result<Lock> {
        if name.is_empty() {
            return Err(LockError::InvalidName);
        }
        let validity = options
            .validity
            .unwrap_or_else(|| self.config.default_validity());
        if !is_representable(validity) {
            return Err(LockError::InvalidValidity);
        }

        let retry_count = self.config.retry.retry_count;
        let drift_limit = self.config.drift_limit(validity);

        for attempt in 1..=retry_count {
            if let Some(reason) = options.interrupt() {
                self.stats.record_failed(reason.as_str());
                return Err(interrupt_error(name, reason));
            }

            match self.try_acquire(name, validity, attempt, &options).await {
                Attempt::Acquired(lock) => return Ok(lock),
                Attempt::Interrupted(reason) => {
                    self.stats.record_failed(reason.as_str());
                    return Err(interrupt_error(name, reason));
                }
                Attempt::Failed { elapsed } => {
                    if elapsed >= drift_limit {
                        warn!(
                            name = %name,
                            attempt = attempt,
                            elapsed_ms = elapsed.as_millis() as u64,
                            limit_ms = drift_limit.as_millis() as u64,
                            "Lock attempt exceeded drift limit, giving up"
                        );
                        self.stats.record_failed("clock_drift");
                        return Err(LockError::ClockDriftExceeded {
                            name: name.to_string(),
                            elapsed,
                            limit: drift_limit,
                        });
                    }
                }
            }

            if attempt < retry_count {
                let delay = self.config.retry.calculate_delay();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    reason = interrupted(options.cancel.as_ref(), options.deadline) => {
                        self.stats.record_failed(reason.as_str());
                        return Err(interrupt_error(name, reason));
                    }
                }
            }
        }

        warn!(name = %name, attempts = retry_count, "Failed to acquire lock");
        self.stats.record_failed("quorum");
        Err(LockError::AcquireFailed {
            name: name.to_string(),
            attempts: retry_count,
        })
    }

    /// One acquisition attempt with a fresh token. Cleans up after itself on
    /// every non-success path.
    async fn try_acquire(
        &self,
        name: &str,
        validity: Duration,
        attempt: u32,
        options: &LockOptions,
    ) -> Attempt {
        self.stats.record_attempt();
        let token = self.tokens.next();
        let start = Instant::now();

        let acquire = async {
            let granted = self
                .fan_out("acquire", FanOut::UntilDecided, |store| {
                    store.acquire_if_absent(name, &token, validity)
                })
                .await;
            let fence = if granted >= self.quorum {
                self.issue_fence(name).await
            } else {
                Ok(None)
            };
            (granted, fence)
        };

        let (granted, fence) = tokio::select! {
            outcome = acquire => outcome,
            reason = interrupted(options.cancel.as_ref(), options.deadline) => {
                debug!(name = %name, attempt = attempt, "Lock attempt interrupted, cleaning up");
                self.release_all(name, &token).await;
                return Attempt::Interrupted(reason);
            }
        };

        let elapsed = start.elapsed();
        let remaining = validity
            .saturating_sub(elapsed)
            .saturating_sub(self.config.drift_margin(validity));

        debug!(
            name = %name,
            attempt = attempt,
            granted = granted,
            quorum = self.quorum,
            elapsed_ms = elapsed.as_millis() as u64,
            "Lock attempt finished"
        );

        match fence {
            Ok(fence) if granted >= self.quorum && !remaining.is_zero() => {
                self.stats.record_acquired(elapsed);
                info!(
                    name = %name,
                    attempt = attempt,
                    validity_ms = remaining.as_millis() as u64,
                    "Lock acquired"
                );
                Attempt::Acquired(Lock::new(name, token, remaining, attempt, fence))
            }
            Ok(_) => {
                self.release_all(name, &token).await;
                Attempt::Failed { elapsed }
            }
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to issue fencing token");
                self.release_all(name, &token).await;
                Attempt::Failed { elapsed }
            }
        }
    }

    /// Release `lock` on every store; succeeds only with a quorum of deletes
    pub async fn unlock(&self, lock: &Lock) -> Result<()> {
        if lock.name().is_empty() {
            return Err(LockError::InvalidName);
        }

        let released = self
            .fan_out("release", FanOut::All, |store| {
                store.release_if_matches(lock.name(), lock.token())
            })
            .await;

        let success = released >= self.quorum;
        self.stats.record_release(success);

        if success {
            info!(name = %lock.name(), released = released, "Lock released");
            Ok(())
        } else {
            warn!(
                name = %lock.name(),
                released = released,
                quorum = self.quorum,
                "Failed to release lock"
            );
            Err(LockError::ReleaseFailed {
                name: lock.name().to_string(),
                released,
                quorum: self.quorum,
            })
        }
    }

    /// Reset the TTL of a still-valid lock to `validity` and return the
    /// renewed handle
    pub async fn extend(&self, lock: &Lock, validity: Duration) -> Result<Lock> {
        if !is_representable(validity) {
            return Err(LockError::InvalidValidity);
        }
        if lock.is_expired() {
            return Err(LockError::LockExpired {
                name: lock.name().to_string(),
            });
        }

        let start = Instant::now();
        let extended = self
            .fan_out("extend", FanOut::All, |store| {
                store.extend_if_matches(lock.name(), lock.token(), validity)
            })
            .await;
        let elapsed = start.elapsed();
        let remaining = validity
            .saturating_sub(elapsed)
            .saturating_sub(self.config.drift_margin(validity));

        if extended >= self.quorum && !remaining.is_zero() {
            self.stats.record_extension();
            debug!(name = %lock.name(), validity_ms = remaining.as_millis() as u64, "Lock extended");
            Ok(Lock::new(
                lock.name(),
                lock.token(),
                remaining,
                lock.attempts(),
                lock.fence_token(),
            ))
        } else {
            warn!(
                name = %lock.name(),
                extended = extended,
                quorum = self.quorum,
                "Failed to extend lock"
            );
            Err(LockError::ExtendFailed {
                name: lock.name().to_string(),
                extended,
                quorum: self.quorum,
            })
        }
    }

    /// Whether `lock` is unexpired and its token is current on a quorum of stores
    pub async fn is_held(&self, lock: &Lock) -> Result<bool> {
        if lock.is_expired() {
            return Ok(false);
        }

        let holding = self
            .fan_out("get", FanOut::UntilDecided, |store| {
                async move {
                    let value: StoreResult<Option<String>> = store.get(lock.name()).await;
                    value.map(|current| current.as_deref() == Some(lock.token()))
                }
                .boxed()
            })
            .await;

        Ok(holding >= self.quorum && lock.is_valid())
    }

    async fn issue_fence(&self, name: &str) -> StoreResult<Option<u64>> {
        match self.config.fencing {
            FencingMode::Disabled => Ok(None),
            FencingMode::Local => Ok(Some(self.fences.next(name))),
            FencingMode::Store(index) => {
                let store = &self.stores[index];
                let timeout = self.config.connect_timeout();
                match tokio::time::timeout(timeout, store.next_fence(name)).await {
                    Ok(fence) => fence.map(Some),
                    Err(_) => Err(StoreError::Timeout(timeout)),
                }
            }
        }
    }

    /// Unconditional clean-up of an attempt on every store
    async fn release_all(&self, name: &str, token: &str) {
        let released = self
            .fan_out("release", FanOut::All, |store| {
                store.release_if_matches(name, token)
            })
            .await;
        debug!(name = %name, released = released, "Cleaned up failed lock attempt");
    }

    /// Run `call` against every store concurrently, each bounded by the
    /// connect timeout, and count the stores that answered `true`.
    /// Errors and timeouts are non-votes.
    async fn fan_out<'a, F>(&'a self, op: &'static str, mode: FanOut, call: F) -> usize
    where
        F: Fn(&'a dyn LockStore) -> BoxFuture<'a, StoreResult<bool>>,
    {
        let timeout = self.config.connect_timeout();
        let total = self.stores.len();

        let mut calls: FuturesUnordered<_> = self
            .stores
            .iter()
            .map(|store| {
                let store: &'a dyn LockStore = store.as_ref();
                let pending = call(store);
                async move { vote(store.id(), op, timeout, pending).await }
            })
            .collect();

        let mut votes = 0;
        let mut responded = 0;
        while let Some(granted) = calls.next().await {
            responded += 1;
            if granted {
                votes += 1;
            }
            if mode == FanOut::UntilDecided
                && (votes >= self.quorum || votes + (total - responded) < self.quorum)
            {
                // Every remaining call still gets its first poll; answers that
                // are already available are counted, slow ones are abandoned
                while let Some(Some(granted)) = calls.next().now_or_never() {
                    if granted {
                        votes += 1;
                    }
                }
                break;
            }
        }
        votes
    }
}

async fn vote(
    store: &str,
    op: &'static str,
    timeout: Duration,
    call: BoxFuture<'_, StoreResult<bool>>,
) -> bool {
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(granted)) => granted,
        Ok(Err(e)) => {
            debug!(store = %store, op = op, error = %e, "Store call failed");
            false
        }
        Err(_) => {
            let e = StoreError::Timeout(timeout);
            debug!(store = %store, op = op, error = %e, "Store call failed");
            false
        }
    }
}

/// A usable validity is positive and its expiry fits in an `Instant`
fn is_representable(validity: Duration) -> bool {
    !validity.is_zero() && Instant::now().checked_add(validity).is_some()
}

fn interrupt_error(name: &str, reason: Interrupt) -> LockError {
    match reason {
        Interrupt::Cancelled => LockError::Cancelled {
            name: name.to_string(),
        },
        Interrupt::Deadline => LockError::DeadlineExceeded {
            name: name.to_string(),
        },
    }
}
