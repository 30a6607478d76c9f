use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pkg_types::lease::{LeasePredicate, LeaseRecord, LeaseUpdate, UpdatedLease};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::store::{LeaseStore, StoreError};

/// In-process lease store.
///
/// Atomicity comes from a single mutex around the whole map. Useful for
/// tests and single-process development; it coordinates nothing across
/// processes.
#[derive(Clone, Default)]
pub struct MemoryLeaseStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    records: HashMap<String, LeaseRecord>,
    /// Number of upcoming operations that fail with `Unavailable`
    failures: u32,
}

impl MemoryInner {
    fn check_failure(&mut self) -> Result<(), StoreError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a record unconditionally. Used to seed state or to play
    /// an external actor in tests.
    pub async fn put_record(&self, record: LeaseRecord) {
        let mut inner = self.inner.lock().await;
        inner.records.insert(record.id.clone(), record);
    }

    /// Make the next `count` operations fail with a transient error.
    pub async fn inject_failures(&self, count: u32) {
        self.inner.lock().await.failures = count;
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn insert_if_absent(&self, record: &LeaseRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_failure()?;
        if inner.records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id.clone()));
        }
        inner.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find_and_update_if(
        &self,
        id: &str,
        predicate: &LeasePredicate,
        update: &LeaseUpdate,
    ) -> Result<Option<UpdatedLease>, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_failure()?;
        match inner.records.get_mut(id) {
            Some(record) if predicate.matches(record) => {
                let previous_owner = record.owner.clone();
                record.apply(update);
                Ok(Some(UpdatedLease {
                    previous_owner,
                    record: record.clone(),
                }))
            }
            _ => Ok(None),
        }
    }

    async fn delete_if(&self, id: &str, predicate: &LeasePredicate) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_failure()?;
        let matched = inner
            .records
            .get(id)
            .is_some_and(|record| predicate.matches(record));
        if matched {
            inner.records.remove(id);
        }
        Ok(matched)
    }

    async fn get(&self, id: &str) -> Result<Option<LeaseRecord>, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_failure()?;
        Ok(inner.records.get(id).cloned())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_failure()?;
        let before = inner.records.len();
        inner.records.retain(|_, record| record.is_held_at(now));
        let purged = before - inner.records.len();
        if purged > 0 {
            debug!("Purged {} expired lease(s)", purged);
        }
        Ok(purged)
    }
}

// ─── Tests ─────────────────────────────────────────────────────
