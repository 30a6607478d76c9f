use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pkg_types::lease::{LeasePredicate, LeaseRecord, LeaseUpdate, UpdatedLease};

/// Error type for lease store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("lease already exists: {0}")]
    AlreadyExists(String),
    #[error("lease store unavailable: {0}")]
    Unavailable(String),
    #[error("lease store backend error: {0}")]
    Backend(String),
    #[error("lease store rejected request: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Backend(_))
    }
}

/// Shared, strongly consistent storage for lease records.
///
/// Every conditional operation is evaluated and applied as one atomic step
/// against the stored record. Leadership correctness depends on that: there
/// must be no window between reading a record and writing it back.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Create the record only if no record with `record.id` exists.
    async fn insert_if_absent(&self, record: &LeaseRecord) -> Result<(), StoreError>;

    /// Apply `update` if the stored record matches `predicate`.
    /// Returns `None` when the predicate fails or no record exists.
    async fn find_and_update_if(
        &self,
        id: &str,
        predicate: &LeasePredicate,
        update: &LeaseUpdate,
    ) -> Result<Option<UpdatedLease>, StoreError>;

    /// Delete the record only if it matches `predicate`.
    async fn delete_if(&self, id: &str, predicate: &LeasePredicate) -> Result<bool, StoreError>;

    /// Read the current record, for diagnostics only. Never base a
    /// write decision on it.
    async fn get(&self, id: &str) -> Result<Option<LeaseRecord>, StoreError>;

    /// Passive expiry: remove every record whose deadline is at or before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}
