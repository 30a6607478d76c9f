use pkg_state::StoreError;
use std::time::Duration;

/// Outcomes of the leader lock that are not "we are the leader".
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The store kept failing (or rejected the request outright).
    #[error("lease store failed after {attempts} attempt(s): {source}")]
    Store {
        attempts: u32,
        #[source]
        source: StoreError,
    },
    /// Another live instance holds the lease. Expected, not a fault.
    #[error("lease is held by {}", .holder.as_deref().unwrap_or("another instance"))]
    LeaseHeld { holder: Option<String> },
    #[error("gave up waiting for the lease after {}s", .waited.as_secs())]
    AcquisitionTimeout { waited: Duration },
    #[error("leadership lost")]
    LeadershipLost,
    #[error("leader lifecycle already started")]
    AlreadyStarted,
    #[error("invalid leader configuration: {0}")]
    InvalidConfig(String),
}

impl LockError {
    /// Whether the process should exit with a failure status.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LockError::LeaseHeld { .. })
    }
}
