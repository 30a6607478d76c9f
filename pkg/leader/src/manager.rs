use chrono::{DateTime, Utc};
use pkg_state::{LeaseStore, StoreError};
use pkg_types::lease::{LeasePredicate, LeaseRecord, LeaseUpdate};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::{LeaderConfig, WaitPolicy};
use crate::error::LockError;

/// How a lease came to be ours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireKind {
    /// No record existed
    Fresh,
    /// The record already named us (e.g. after an in-process restart)
    Reclaimed,
    /// The previous holder's lease had expired
    Stolen { previous_owner: String },
}

/// Proof of a successful acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseHandle {
    pub service_id: String,
    pub owner: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub kind: AcquireKind,
}

/// Result of a single acquisition attempt against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Acquired(LeaseHandle),
    /// Someone else holds a live lease. `holder` is best effort.
    Held { holder: Option<String> },
}

/// Decides whether this instance becomes the leader.
///
/// Mutual exclusion comes entirely from the store's atomic conditional
/// operations; the manager only sequences them and applies the wait policy.
pub struct LockManager {
    store: Arc<dyn LeaseStore>,
    clock: Arc<dyn Clock>,
    config: LeaderConfig,
}

impl LockManager {
    pub fn new(store: Arc<dyn LeaseStore>, clock: Arc<dyn Clock>, config: LeaderConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &LeaderConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> Arc<dyn LeaseStore> {
        Arc::clone(&self.store)
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Acquire the lease according to the configured wait policy.
    pub async fn acquire(&self) -> Result<LeaseHandle, LockError> {
        self.config.validate()?;

        let service_id = self.config.service_id.as_str();
        let owner = self.config.identity.instance_id.as_str();
        let started = Instant::now();
        let deadline = match self.config.wait {
            WaitPolicy::NonBlocking => None,
            WaitPolicy::Blocking { max_wait } => max_wait.map(|w| started + w),
        };
        let blocking = matches!(self.config.wait, WaitPolicy::Blocking { .. });

        let mut round: u64 = 0;
        loop {
            round += 1;
            // The wait bound covers store round-trips too, not only the pauses.
            let attempt = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.attempt_with_retries()).await {
                        Ok(attempt) => attempt,
                        Err(_) => return Err(self.timed_out(started)),
                    }
                }
                None => self.attempt_with_retries().await,
            };
            match attempt {
                Ok(AttemptOutcome::Acquired(handle)) => {
                    log_acquired(&handle, started.elapsed());
                    return Ok(handle);
                }
                Ok(AttemptOutcome::Held { holder }) => {
                    let holder_name = holder.as_deref().unwrap_or("unknown");
                    if !blocking {
                        info!(
                            service_id,
                            owner,
                            holder = holder_name,
                            "Lease held by another instance; standing down"
                        );
                        return Err(LockError::LeaseHeld { holder });
                    }
                    if round == 1 {
                        info!(
                            service_id,
                            owner,
                            holder = holder_name,
                            "Lease held by another instance; waiting for it to expire"
                        );
                    } else {
                        debug!(service_id, owner, round, holder = holder_name, "Lease still held");
                    }
                }
                Err(LockError::Store { attempts, source }) if blocking && source.is_transient() => {
                    warn!(
                        service_id,
                        owner,
                        attempts,
                        error = %source,
                        "Lease store unavailable; still waiting"
                    );
                }
                Err(e) => {
                    error!(service_id, owner, error = %e, "Lease acquisition failed");
                    return Err(e);
                }
            }

            let mut pause = self.backoff();
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(self.timed_out(started));
                }
                pause = pause.min(deadline - now);
            }
            tokio::time::sleep(pause).await;
        }
    }

    fn timed_out(&self, started: Instant) -> LockError {
        let waited = started.elapsed();
        error!(
            service_id = %self.config.service_id,
            owner = %self.config.identity,
            waited_secs = waited.as_secs(),
            "Timed out waiting for the lease"
        );
        LockError::AcquisitionTimeout { waited }
    }

    /// One attempt, retried on transient store errors with a fixed delay.
    async fn attempt_with_retries(&self) -> Result<AttemptOutcome, LockError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.try_acquire_once().await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() && attempts <= self.config.transient_retries => {
                    warn!(
                        service_id = %self.config.service_id,
                        owner = %self.config.identity,
                        attempt = attempts,
                        error = %e,
                        "Lease store error during acquisition, retrying in {}ms",
                        self.config.transient_retry_delay.as_millis()
                    );
                    tokio::time::sleep(self.config.transient_retry_delay).await;
                }
                Err(source) => return Err(LockError::Store { attempts, source }),
            }
        }
    }

    /// A single acquire-or-steal attempt, with no retries and no waiting.
    pub async fn try_acquire_once(&self) -> Result<AttemptOutcome, StoreError> {
        let now = self.clock.now();
        let expires_at = now + self.config.lease_delta();
        let id = self.config.service_id.as_str();
        let me = self.config.identity.instance_id.as_str();

        let update = LeaseUpdate {
            owner: me.to_string(),
            host: self.config.identity.host.clone(),
            updated_at: now,
            expires_at,
        };
        let predicate = LeasePredicate::ExpiredOrOwnedBy {
            now,
            owner: me.to_string(),
        };

        // Expired, or already ours: take it in one conditional write.
        if let Some(updated) = self.store.find_and_update_if(id, &predicate, &update).await? {
            let kind = if updated.previous_owner == me {
                AcquireKind::Reclaimed
            } else {
                AcquireKind::Stolen {
                    previous_owner: updated.previous_owner,
                }
            };
            return Ok(AttemptOutcome::Acquired(LeaseHandle {
                service_id: id.to_string(),
                owner: me.to_string(),
                acquired_at: now,
                expires_at: updated.record.expires_at,
                kind,
            }));
        }

        // Either held by someone else or absent. Only an insert can tell.
        let record = LeaseRecord::new(id, me, self.config.identity.host.clone(), now, expires_at);
        match self.store.insert_if_absent(&record).await {
            Ok(()) => Ok(AttemptOutcome::Acquired(LeaseHandle {
                service_id: id.to_string(),
                owner: me.to_string(),
                acquired_at: now,
                expires_at,
                kind: AcquireKind::Fresh,
            })),
            Err(StoreError::AlreadyExists(_)) => {
                let holder = match self.store.get(id).await {
                    Ok(Some(current)) => Some(current.owner),
                    _ => None,
                };
                Ok(AttemptOutcome::Held { holder })
            }
            Err(e) => Err(e),
        }
    }

    /// Jittered sleep, uniform in `[0.5, 1.5] × base`, capped at the ceiling.
    fn backoff(&self) -> Duration {
        let base = self.config.backoff_base.as_millis() as u64;
        let millis = rand::rng().random_range(base / 2..=base + base / 2);
        Duration::from_millis(millis).min(self.config.backoff_ceiling)
    }
}

fn log_acquired(handle: &LeaseHandle, waited: Duration) {
    match &handle.kind {
        AcquireKind::Fresh => info!(
            service_id = %handle.service_id,
            owner = %handle.owner,
            expires_at = %handle.expires_at,
            waited_ms = waited.as_millis() as u64,
            "Lease acquired (fresh)"
        ),
        AcquireKind::Reclaimed => info!(
            service_id = %handle.service_id,
            owner = %handle.owner,
            expires_at = %handle.expires_at,
            waited_ms = waited.as_millis() as u64,
            "Lease reclaimed (already ours)"
        ),
        AcquireKind::Stolen { previous_owner } => warn!(
            service_id = %handle.service_id,
            owner = %handle.owner,
            previous_owner = %previous_owner,
            expires_at = %handle.expires_at,
            waited_ms = waited.as_millis() as u64,
            "Took over stale lease"
        ),
    }
}

// ─── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::identity::InstanceIdentity;
    use async_trait::async_trait;
    use pkg_state::memory::MemoryLeaseStore;
    use pkg_types::lease::UpdatedLease;

    /// Every call takes ten seconds to fail.
    struct SlowStore;

    impl SlowStore {
        async fn stall<T>() -> Result<T, StoreError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Err(StoreError::Unavailable("request timed out".to_string()))
        }
    }

    #[async_trait]
    impl LeaseStore for SlowStore {
        async fn insert_if_absent(&self, _record: &LeaseRecord) -> Result<(), StoreError> {
            Self::stall().await
        }

        async fn find_and_update_if(
            &self,
            _id: &str,
            _predicate: &LeasePredicate,
            _update: &LeaseUpdate,
        ) -> Result<Option<UpdatedLease>, StoreError> {
            Self::stall().await
        }

        async fn delete_if(&self, _id: &str, _predicate: &LeasePredicate) -> Result<bool, StoreError> {
            Self::stall().await
        }

        async fn get(&self, _id: &str) -> Result<Option<LeaseRecord>, StoreError> {
            Self::stall().await
        }

        async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize, StoreError> {
            Self::stall().await
        }
    }

    fn manager(store: &MemoryLeaseStore, owner: &str, clock: &TokioClock) -> LockManager {
        let config = LeaderConfig::new(
            "svc-1",
            InstanceIdentity::new(owner, format!("{}-host", owner)),
            Duration::from_secs(60),
        );
        LockManager::new(Arc::new(store.clone()), Arc::new(clock.clone()), config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_acquire_on_empty_store() {
        let store = MemoryLeaseStore::new();
        let clock = TokioClock::new();
        let handle = manager(&store, "a", &clock).acquire().await.unwrap();

        assert_eq!(handle.kind, AcquireKind::Fresh);
        let record = store.get("svc-1").await.unwrap().unwrap();
        assert_eq!(record.owner, "a");
        assert_eq!(record.host, "a-host");
        assert_eq!(record.expires_at, handle.expires_at);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_blocking_reports_holder() {
        let store = MemoryLeaseStore::new();
        let clock = TokioClock::new();
        manager(&store, "a", &clock).acquire().await.unwrap();

        let err = manager(&store, "b", &clock).acquire().await.unwrap_err();
        match err {
            LockError::LeaseHeld { holder } => assert_eq!(holder.as_deref(), Some("a")),
            other => panic!("expected LeaseHeld, got {:?}", other),
        }
        assert!(!LockError::LeaseHeld { holder: None }.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let store = MemoryLeaseStore::new();
        let clock = TokioClock::new();
        store.inject_failures(2).await;

        let handle = manager(&store, "a", &clock).acquire().await.unwrap();
        assert_eq!(handle.owner, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_are_fatal_in_non_blocking_mode() {
        let store = MemoryLeaseStore::new();
        let clock = TokioClock::new();
        store.inject_failures(100).await;

        let err = manager(&store, "a", &clock).acquire().await.unwrap_err();
        match err {
            LockError::Store { attempts, source } => {
                assert_eq!(attempts, 4);
                assert!(source.is_transient());
            }
            other => panic!("expected Store error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_mode_rides_out_store_outage() {
        let store = MemoryLeaseStore::new();
        let clock = TokioClock::new();
        // Two full rounds of failures (4 attempts each), then the store recovers.
        store.inject_failures(8).await;

        let mgr = manager(&store, "a", &clock);
        let mgr = LockManager {
            config: mgr
                .config
                .clone()
                .with_wait(WaitPolicy::Blocking { max_wait: None }),
            ..mgr
        };
        let handle = mgr.acquire().await.unwrap();
        assert_eq!(handle.kind, AcquireKind::Fresh);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_is_rejected_before_touching_store() {
        let store = MemoryLeaseStore::new();
        let clock = TokioClock::new();
        let mut mgr = manager(&store, "a", &clock);
        mgr.config.lease_duration = Duration::ZERO;

        assert!(matches!(
            mgr.acquire().await,
            Err(LockError::InvalidConfig(_))
        ));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_backoff_stays_in_jitter_band() {
        let store = MemoryLeaseStore::new();
        let clock = TokioClock::starting_at(Utc::now());
        let mgr = manager(&store, "a", &clock);
        for _ in 0..200 {
            let pause = mgr.backoff();
            assert!(pause >= Duration::from_millis(250), "{:?}", pause);
            assert!(pause <= Duration::from_millis(750), "{:?}", pause);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_wait_bounds_slow_store_calls() {
        let clock = TokioClock::new();
        let config = LeaderConfig::new(
            "svc-1",
            InstanceIdentity::new("a", "a-host"),
            Duration::from_secs(60),
        )
        .with_wait(WaitPolicy::Blocking {
            max_wait: Some(Duration::from_secs(5)),
        });
        let mgr = LockManager::new(Arc::new(SlowStore), Arc::new(clock), config);
        let started = Instant::now();

        match mgr.acquire().await {
            Err(LockError::AcquisitionTimeout { waited }) => {
                assert!(waited >= Duration::from_secs(5), "{:?}", waited);
            }
            other => panic!("expected AcquisitionTimeout, got {:?}", other),
        }
        // A single store call alone would have taken ten seconds.
        assert!(started.elapsed() < Duration::from_secs(6));
    }
}
