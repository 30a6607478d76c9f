//! Behaviour every `LeaseStore` implementation must share.

use chrono::{DateTime, Duration, TimeZone, Utc};
use pkg_types::lease::{LeasePredicate, LeaseRecord, LeaseUpdate};

use crate::store::{LeaseStore, StoreError};

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn update(owner: &str, now: i64, lease_secs: i64) -> LeaseUpdate {
    LeaseUpdate {
        owner: owner.to_string(),
        host: format!("{}-host", owner),
        updated_at: t(now),
        expires_at: t(now) + Duration::seconds(lease_secs),
    }
}

pub async fn check_store_contract(store: &dyn LeaseStore) {
    // insert-if-absent is unique per id
    let a = LeaseRecord::new("svc-1", "a", "a-host", t(0), t(60));
    store.insert_if_absent(&a).await.unwrap();
    let dup = LeaseRecord::new("svc-1", "b", "b-host", t(0), t(60));
    assert!(matches!(
        store.insert_if_absent(&dup).await,
        Err(StoreError::AlreadyExists(_))
    ));
    assert_eq!(store.get("svc-1").await.unwrap(), Some(a.clone()));

    // a live lease cannot be taken by someone else
    let steal_early = LeasePredicate::ExpiredOrOwnedBy {
        now: t(30),
        owner: "b".to_string(),
    };
    let res = store
        .find_and_update_if("svc-1", &steal_early, &update("b", 30, 60))
        .await
        .unwrap();
    assert!(res.is_none());

    // the owner can renew; createdAt survives
    let renewed = store
        .find_and_update_if("svc-1", &LeasePredicate::owned_by("a"), &update("a", 20, 60))
        .await
        .unwrap()
        .expect("owner renew");
    assert_eq!(renewed.previous_owner, "a");
    assert_eq!(renewed.record.expires_at, t(80));
    assert_eq!(renewed.record.created_at, t(0));

    // once expired anyone may take it
    let steal_late = LeasePredicate::ExpiredOrOwnedBy {
        now: t(80),
        owner: "b".to_string(),
    };
    let stolen = store
        .find_and_update_if("svc-1", &steal_late, &update("b", 80, 60))
        .await
        .unwrap()
        .expect("steal of expired lease");
    assert_eq!(stolen.previous_owner, "a");
    assert_eq!(stolen.record.owner, "b");
    assert_eq!(stolen.record.expires_at, t(140));

    // no record at all: no match
    let missing = store
        .find_and_update_if("svc-404", &steal_late, &update("b", 80, 60))
        .await
        .unwrap();
    assert!(missing.is_none());

    // release only by the rightful owner
    assert!(
        !store
            .delete_if("svc-1", &LeasePredicate::owned_by("a"))
            .await
            .unwrap()
    );
    assert!(store.get("svc-1").await.unwrap().is_some());
    assert!(
        store
            .delete_if("svc-1", &LeasePredicate::owned_by("b"))
            .await
            .unwrap()
    );
    assert!(store.get("svc-1").await.unwrap().is_none());

    // passive expiry removes stale records only
    let stale = LeaseRecord::new("svc-stale", "c", "c-host", t(0), t(10));
    let live = LeaseRecord::new("svc-live", "d", "d-host", t(0), t(100));
    store.insert_if_absent(&stale).await.unwrap();
    store.insert_if_absent(&live).await.unwrap();
    assert_eq!(store.purge_expired(t(10)).await.unwrap(), 1);
    assert!(store.get("svc-stale").await.unwrap().is_none());
    assert!(store.get("svc-live").await.unwrap().is_some());
}
