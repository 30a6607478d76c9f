use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pkg_leader::{
    AcquireKind, AttemptOutcome, Clock, InstanceIdentity, LeaderConfig, LeaderLifecycle,
    LeadershipState, LockError, LockManager, StartOutcome, TokioClock, WaitPolicy,
};
use pkg_state::memory::MemoryLeaseStore;
use pkg_state::{LeaseStore, StoreError};
use pkg_types::lease::{LeasePredicate, LeaseRecord, LeaseUpdate, UpdatedLease};
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

const SERVICE: &str = "svc-1";

fn config(owner: &str, lease_secs: u64) -> LeaderConfig {
    LeaderConfig::new(
        SERVICE,
        InstanceIdentity::new(owner, format!("{}-host", owner)),
        Duration::from_secs(lease_secs),
    )
}

fn manager(store: Arc<dyn LeaseStore>, clock: &TokioClock, cfg: LeaderConfig) -> LockManager {
    LockManager::new(store, Arc::new(clock.clone()), cfg)
}

fn lifecycle(store: Arc<dyn LeaseStore>, clock: &TokioClock, cfg: LeaderConfig) -> LeaderLifecycle {
    LeaderLifecycle::new(store, Arc::new(clock.clone()), cfg)
}

/// Counts conditional updates so tests can see when renewals stop.
struct CountingStore {
    inner: MemoryLeaseStore,
    updates: AtomicUsize,
}

#[async_trait]
impl LeaseStore for CountingStore {
    async fn insert_if_absent(&self, record: &LeaseRecord) -> Result<(), StoreError> {
        self.inner.insert_if_absent(record).await
    }

    async fn find_and_update_if(
        &self,
        id: &str,
        predicate: &LeasePredicate,
        update: &LeaseUpdate,
    ) -> Result<Option<UpdatedLease>, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.find_and_update_if(id, predicate, update).await
    }

    async fn delete_if(&self, id: &str, predicate: &LeasePredicate) -> Result<bool, StoreError> {
        self.inner.delete_if(id, predicate).await
    }

    async fn get(&self, id: &str) -> Result<Option<LeaseRecord>, StoreError> {
        self.inner.get(id).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.inner.purge_expired(now).await
    }
}

// ─── Lock manager ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_concurrent_first_acquisitions_elect_one() {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
    let clock = TokioClock::new();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let mgr = manager(Arc::clone(&store), &clock, config(&format!("inst-{}", i), 60));
        tasks.push(tokio::spawn(async move { mgr.try_acquire_once().await }));
    }

    let mut winners = Vec::new();
    for task in tasks {
        match task.await.unwrap().unwrap() {
            AttemptOutcome::Acquired(handle) => winners.push(handle.owner),
            AttemptOutcome::Held { .. } => {}
        }
    }
    assert_eq!(winners.len(), 1);
    let record = store.get(SERVICE).await.unwrap().unwrap();
    assert_eq!(record.owner, winners[0]);
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_live_owner_under_random_schedule() {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
    let clock = TokioClock::new();
    let managers: Vec<LockManager> = (0..5)
        .map(|i| manager(Arc::clone(&store), &clock, config(&format!("inst-{}", i), 2)))
        .collect();

    // (owner, latest confirmed expiry) of the current holder
    let mut holder: Option<(String, DateTime<Utc>)> = None;
    let mut handovers = 0;
    for _ in 0..300 {
        let (pause, pick) = {
            let mut rng = rand::rng();
            (rng.random_range(0..1500), rng.random_range(0..managers.len()))
        };
        tokio::time::sleep(Duration::from_millis(pause)).await;

        let outcome = managers[pick].try_acquire_once().await.unwrap();
        if let AttemptOutcome::Acquired(handle) = outcome {
            if let Some((owner, expires_at)) = &holder {
                if *owner != handle.owner {
                    assert!(
                        handle.acquired_at >= *expires_at,
                        "{} acquired at {} while {} held until {}",
                        handle.owner,
                        handle.acquired_at,
                        owner,
                        expires_at
                    );
                    handovers += 1;
                }
            }
            holder = Some((handle.owner, handle.expires_at));
        }
    }
    assert!(handovers > 0);
}

#[tokio::test(start_paused = true)]
async fn test_expired_lease_is_taken_over() {
    let store = MemoryLeaseStore::new();
    let clock = TokioClock::new();
    let now = clock.now();
    store
        .put_record(LeaseRecord::new(
            SERVICE,
            "crashed",
            "old-host",
            now - chrono::Duration::seconds(120),
            now - chrono::Duration::seconds(1),
        ))
        .await;

    let handle = manager(Arc::new(store.clone()), &clock, config("b", 60))
        .acquire()
        .await
        .unwrap();

    assert_eq!(
        handle.kind,
        AcquireKind::Stolen {
            previous_owner: "crashed".to_string()
        }
    );
    let record = store.get(SERVICE).await.unwrap().unwrap();
    assert_eq!(record.owner, "b");
    assert_eq!(record.host, "b-host");
    assert_eq!(record.expires_at, now + chrono::Duration::seconds(60));
}

#[tokio::test(start_paused = true)]
async fn test_own_live_lease_is_reclaimed() {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
    let clock = TokioClock::new();
    let first = manager(Arc::clone(&store), &clock, config("a", 60))
        .acquire()
        .await
        .unwrap();
    assert_eq!(first.kind, AcquireKind::Fresh);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let again = manager(Arc::clone(&store), &clock, config("a", 60))
        .acquire()
        .await
        .unwrap();
    assert_eq!(again.kind, AcquireKind::Reclaimed);
    assert!(again.expires_at > first.expires_at);

    let record = store.get(SERVICE).await.unwrap().unwrap();
    assert_eq!(record.created_at, first.acquired_at);
}

#[tokio::test(start_paused = true)]
async fn test_blocking_wait_times_out() {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
    let clock = TokioClock::new();
    let mut a = lifecycle(Arc::clone(&store), &clock, config("a", 60));
    assert!(matches!(a.start().await, StartOutcome::Leader(_)));

    let b = manager(
        Arc::clone(&store),
        &clock,
        config("b", 60).with_wait(WaitPolicy::Blocking {
            max_wait: Some(Duration::from_secs(5)),
        }),
    );
    let started = Instant::now();
    match b.acquire().await {
        Err(LockError::AcquisitionTimeout { waited }) => {
            assert!(waited >= Duration::from_secs(5));
            assert!(started.elapsed() < Duration::from_secs(6));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    a.shutdown().await;
}

// ─── Heartbeat ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_heartbeat_strictly_extends_expiry() {
    let store = MemoryLeaseStore::new();
    let clock = TokioClock::new();
    let mut lc = lifecycle(Arc::new(store.clone()), &clock, config("a", 3));
    let status = lc.status();
    assert!(matches!(lc.start().await, StartOutcome::Leader(_)));

    let mut last = store.get(SERVICE).await.unwrap().unwrap().expires_at;
    // interval is 1s; sample halfway between beats
    tokio::time::sleep(Duration::from_millis(500)).await;
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let current = store.get(SERVICE).await.unwrap().unwrap().expires_at;
        assert!(current > last, "{} should be after {}", current, last);
        last = current;
        assert!(status.is_leader());
    }
    assert_eq!(status.state(), LeadershipState::Leader { expires_at: last });

    lc.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stolen_lease_is_detected_once() {
    let store = Arc::new(CountingStore {
        inner: MemoryLeaseStore::new(),
        updates: AtomicUsize::new(0),
    });
    let clock = TokioClock::new();
    let mut lc = lifecycle(store.clone(), &clock, config("a", 60));
    let status = lc.status();
    let transitions = lc.status();
    assert!(matches!(lc.start().await, StartOutcome::Leader(_)));

    let now = clock.now();
    let intruder = LeaseRecord::new(SERVICE, "intruder", "x-host", now, now + chrono::Duration::seconds(600));
    store.inner.put_record(intruder.clone()).await;

    let lost_at = {
        let started = Instant::now();
        status.stepped_down().await;
        started.elapsed()
    };
    assert!(lost_at <= Duration::from_secs(20));
    let calls_at_loss = store.updates.load(Ordering::SeqCst);

    // No further renewals, no state flapping.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(store.updates.load(Ordering::SeqCst), calls_at_loss);
    assert_eq!(transitions.state(), LeadershipState::LostLeadership);
    transitions.stepped_down().await;

    // Shutdown after loss leaves the new holder's record alone.
    lc.shutdown().await;
    assert_eq!(store.get(SERVICE).await.unwrap(), Some(intruder));
    assert_eq!(status.state(), LeadershipState::LostLeadership);
}

// ─── Release ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_graceful_shutdown_releases_own_lease() {
    let store = MemoryLeaseStore::new();
    let clock = TokioClock::new();
    let mut lc = lifecycle(Arc::new(store.clone()), &clock, config("a", 60));
    assert!(matches!(lc.start().await, StartOutcome::Leader(_)));

    lc.shutdown().await;
    assert!(store.get(SERVICE).await.unwrap().is_none());
    assert_eq!(lc.status().state(), LeadershipState::Released);

    // The next instance gets a fresh lease immediately.
    let handle = manager(Arc::new(store.clone()), &clock, config("b", 60))
        .acquire()
        .await
        .unwrap();
    assert_eq!(handle.kind, AcquireKind::Fresh);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_never_deletes_another_owners_lease() {
    let store = MemoryLeaseStore::new();
    let clock = TokioClock::new();
    let mut lc = lifecycle(Arc::new(store.clone()), &clock, config("a", 60));
    assert!(matches!(lc.start().await, StartOutcome::Leader(_)));

    // Reassigned behind our back before the first heartbeat notices.
    let now = clock.now();
    let other = LeaseRecord::new(SERVICE, "b", "b-host", now, now + chrono::Duration::seconds(60));
    store.put_record(other.clone()).await;

    lc.shutdown().await;
    assert_eq!(store.get(SERVICE).await.unwrap(), Some(other));
}

#[tokio::test(start_paused = true)]
async fn test_release_failure_is_not_fatal() {
    let store = MemoryLeaseStore::new();
    let clock = TokioClock::new();
    let mut lc = lifecycle(Arc::new(store.clone()), &clock, config("a", 60));
    assert!(matches!(lc.start().await, StartOutcome::Leader(_)));

    store.inject_failures(1).await;
    lc.shutdown().await;
    assert_eq!(lc.status().state(), LeadershipState::Released);
    assert!(store.get(SERVICE).await.unwrap().is_some());
}

// ─── Scenarios ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_simultaneous_start_non_blocking() {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
    let clock = TokioClock::new();
    let mut a = lifecycle(Arc::clone(&store), &clock, config("A", 60));
    let mut b = lifecycle(Arc::clone(&store), &clock, config("B", 60));

    let (ra, rb) = tokio::join!(
        tokio::spawn(async move {
            let outcome = a.start().await;
            (a, outcome)
        }),
        tokio::spawn(async move {
            let outcome = b.start().await;
            (b, outcome)
        }),
    );
    let (mut a, ra) = ra.unwrap();
    let (mut b, rb) = rb.unwrap();

    let leaders = [&ra, &rb]
        .iter()
        .filter(|o| matches!(o, StartOutcome::Leader(_)))
        .count();
    let standing_down = [&ra, &rb]
        .iter()
        .filter(|o| matches!(o, StartOutcome::NotLeader { .. }))
        .count();
    assert_eq!(leaders, 1);
    assert_eq!(standing_down, 1);

    a.shutdown().await;
    b.shutdown().await;
    assert!(store.get(SERVICE).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_waiting_instance_takes_over_after_crash() {
    let store: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
    let clock = TokioClock::new();
    let t0 = Instant::now();

    // A acquires at t=0 and crashes at t=10 without releasing or renewing.
    let a = manager(Arc::clone(&store), &clock, config("A", 60));
    let a_handle = a.acquire().await.unwrap();
    drop(a);

    let b = manager(
        Arc::clone(&store),
        &clock,
        config("B", 60).with_wait(WaitPolicy::from_flags(true, 120)),
    );
    let handle = b.acquire().await.unwrap();
    let at = t0.elapsed();

    assert!(at >= Duration::from_secs(60), "took over early at {:?}", at);
    assert!(at < Duration::from_secs(61), "took over late at {:?}", at);
    assert!(handle.acquired_at >= a_handle.expires_at);
    assert_eq!(
        handle.kind,
        AcquireKind::Stolen {
            previous_owner: "A".to_string()
        }
    );
}
