use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pkg_constants::lease::LEASE_KEY_PREFIX;
use pkg_types::lease::{LeasePredicate, LeaseRecord, LeaseUpdate, UpdatedLease};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::client::StateStore;
use crate::store::{LeaseStore, StoreError};

/// Durable lease store on top of SlateDB.
///
/// SlateDB has a single writer per data directory, so serializing the
/// read-modify-write of each conditional operation behind one async mutex
/// makes it atomic for every client of this process.
#[derive(Clone)]
pub struct SlateLeaseStore {
    state: StateStore,
    write_lock: Arc<Mutex<()>>,
}

fn lease_key(id: &str) -> String {
    format!("{}{}", LEASE_KEY_PREFIX, id)
}

fn backend(e: anyhow::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl SlateLeaseStore {
    pub fn new(state: StateStore) -> Self {
        Self {
            state,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load(&self, id: &str) -> Result<Option<LeaseRecord>, StoreError> {
        self.state.get_json(&lease_key(id)).await.map_err(backend)
    }

    async fn store(&self, record: &LeaseRecord) -> Result<(), StoreError> {
        self.state
            .put_json(&lease_key(&record.id), record)
            .await
            .map_err(backend)
    }
}

#[async_trait]
impl LeaseStore for SlateLeaseStore {
    async fn insert_if_absent(&self, record: &LeaseRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        if self.load(&record.id).await?.is_some() {
            return Err(StoreError::AlreadyExists(record.id.clone()));
        }
        self.store(record).await
    }

    async fn find_and_update_if(
        &self,
        id: &str,
        predicate: &LeasePredicate,
        update: &LeaseUpdate,
    ) -> Result<Option<UpdatedLease>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut record = match self.load(id).await? {
            Some(r) if predicate.matches(&r) => r,
            _ => return Ok(None),
        };
        let previous_owner = record.owner.clone();
        record.apply(update);
        self.store(&record).await?;
        Ok(Some(UpdatedLease {
            previous_owner,
            record,
        }))
    }

    async fn delete_if(&self, id: &str, predicate: &LeasePredicate) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        match self.load(id).await? {
            Some(r) if predicate.matches(&r) => {
                self.state.delete(&lease_key(id)).await.map_err(backend)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<LeaseRecord>, StoreError> {
        self.load(id).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;
        let entries = self
            .state
            .list_prefix(LEASE_KEY_PREFIX)
            .await
            .map_err(backend)?;

        let mut purged = 0;
        for (key, value) in entries {
            let record: LeaseRecord = match serde_json::from_slice(&value) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if record.is_expired_at(now) {
                self.state.delete(&key).await.map_err(backend)?;
                debug!(
                    "Purged expired lease {} (owner={}, expired_at={})",
                    record.id, record.owner, record.expires_at
                );
                purged += 1;
            }
        }
        Ok(purged)
    }
}

// ─── Tests ─────────────────────────────────────────────────────
