use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// Per-process leadership state machine.
///
/// `Unstarted → Acquiring → {Leader, NotLeader, Failed}`,
/// `Leader → Leader` on each heartbeat, then `LostLeadership` or `Released`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadershipState {
    Unstarted,
    Acquiring,
    /// Holding the lease until at least `expires_at`
    Leader { expires_at: DateTime<Utc> },
    NotLeader,
    Failed,
    LostLeadership,
    Released,
}

impl LeadershipState {
    pub fn is_leader(&self) -> bool {
        matches!(self, LeadershipState::Leader { .. })
    }
}

impl std::fmt::Display for LeadershipState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeadershipState::Unstarted => write!(f, "unstarted"),
            LeadershipState::Acquiring => write!(f, "acquiring"),
            LeadershipState::Leader { .. } => write!(f, "leader"),
            LeadershipState::NotLeader => write!(f, "not_leader"),
            LeadershipState::Failed => write!(f, "failed"),
            LeadershipState::LostLeadership => write!(f, "lost_leadership"),
            LeadershipState::Released => write!(f, "released"),
        }
    }
}

/// Read-only view of the leadership state. Cheap to clone; the lifecycle
/// and its heartbeat task are the only writers.
#[derive(Debug, Clone)]
pub struct LeadershipStatus {
    rx: watch::Receiver<LeadershipState>,
}

impl LeadershipStatus {
    pub(crate) fn new(rx: watch::Receiver<LeadershipState>) -> Self {
        Self { rx }
    }

    pub fn is_leader(&self) -> bool {
        self.rx.borrow().is_leader()
    }

    pub fn state(&self) -> LeadershipState {
        self.rx.borrow().clone()
    }

    /// Resolves as soon as this process is not the leader, for whatever reason.
    pub async fn stepped_down(&self) {
        self.wait_until(|s| !s.is_leader()).await;
    }

    async fn wait_until(&self, f: impl FnMut(&LeadershipState) -> bool) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(f).await.is_err();
        if closed {
            // Writer gone: the state can no longer change.
            std::future::pending::<()>().await;
        }
    }
}

/// Resolves once `rx` reads `true`, or once its sender is gone.
pub async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
