use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A time-bounded grant of exclusive ownership over a service identity.
/// Stored at `/registry/leases/<id>`; one record per `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseRecord {
    /// Logical service identity (e.g. "solo-bot")
    pub id: String,
    /// The process instance holding this lease
    pub owner: String,
    /// Hosting node name, informational only
    pub host: String,
    /// When the record was first created (set once)
    pub created_at: DateTime<Utc>,
    /// Last heartbeat or acquisition
    pub updated_at: DateTime<Utc>,
    /// Lease deadline
    pub expires_at: DateTime<Utc>,
}

impl LeaseRecord {
    pub fn new(
        id: impl Into<String>,
        owner: impl Into<String>,
        host: impl Into<String>,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            host: host.into(),
            created_at: now,
            updated_at: now,
            expires_at,
        }
    }

    /// A lease is held iff `now < expires_at`.
    pub fn is_held_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Expired records are free for anyone to claim, whoever `owner` is.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_held_at(now)
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner == owner
    }

    /// Apply an update in place. `id` and `created_at` are never touched.
    ///
    /// While the owner stays the same the deadline only moves forward;
    /// a new owner always gets the fresh deadline.
    pub fn apply(&mut self, update: &LeaseUpdate) {
        if self.owner == update.owner {
            self.expires_at = self.expires_at.max(update.expires_at);
        } else {
            self.owner = update.owner.clone();
            self.expires_at = update.expires_at;
        }
        self.host = update.host.clone();
        self.updated_at = update.updated_at;
    }
}

/// Condition evaluated atomically by the lease store against the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LeasePredicate {
    /// `expiresAt <= now || owner == owner`: used to acquire or steal.
    ExpiredOrOwnedBy { now: DateTime<Utc>, owner: String },
    /// `owner == owner`: used to renew and release.
    OwnedBy { owner: String },
}

impl LeasePredicate {
    pub fn owned_by(owner: impl Into<String>) -> Self {
        Self::OwnedBy {
            owner: owner.into(),
        }
    }

    pub fn matches(&self, record: &LeaseRecord) -> bool {
        match self {
            Self::ExpiredOrOwnedBy { now, owner } => {
                record.is_expired_at(*now) || record.is_owned_by(owner)
            }
            Self::OwnedBy { owner } => record.is_owned_by(owner),
        }
    }
}

/// Fields written by an acquisition or heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseUpdate {
    pub owner: String,
    pub host: String,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful conditional update: the post-update record
/// plus whoever owned it before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedLease {
    pub previous_owner: String,
    pub record: LeaseRecord,
}

/// Body of `POST /api/v1/leases/{id}/update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalUpdateRequest {
    pub predicate: LeasePredicate,
    pub update: LeaseUpdate,
}

/// Body of `POST /api/v1/leases/{id}/delete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalDeleteRequest {
    pub predicate: LeasePredicate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// Body of `POST /api/v1/leases/purge`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeRequest {
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub purged: usize,
}

// ─── Tests ─────────────────────────────────────────────────────
