use pkg_state::LeaseStore;
use pkg_types::lease::LeasePredicate;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::LeaderConfig;
use crate::error::LockError;
use crate::heartbeat::{HeartbeatRenewer, RenewerExit};
use crate::manager::{LeaseHandle, LockManager};
use crate::status::{LeadershipState, LeadershipStatus};

/// Result of [`LeaderLifecycle::start`].
#[derive(Debug)]
pub enum StartOutcome {
    /// We hold the lease and the heartbeat is running.
    Leader(LeaseHandle),
    /// Another live instance holds the lease. Expected; exit quietly.
    NotLeader { holder: Option<String> },
    Failed(LockError),
}

struct Running {
    handle: LeaseHandle,
    shutdown_tx: watch::Sender<bool>,
    renewer: JoinHandle<RenewerExit>,
}

/// Orchestrates acquire → heartbeat → release for one process.
///
/// The rest of the application calls `start()` once, watches
/// [`LeadershipStatus`], and calls `shutdown()` on every exit path.
pub struct LeaderLifecycle {
    manager: LockManager,
    state_tx: watch::Sender<LeadershipState>,
    running: Option<Running>,
    started: bool,
}

impl LeaderLifecycle {
    pub fn new(store: Arc<dyn LeaseStore>, clock: Arc<dyn Clock>, config: LeaderConfig) -> Self {
        let (state_tx, _) = watch::channel(LeadershipState::Unstarted);
        Self {
            manager: LockManager::new(store, clock, config),
            state_tx,
            running: None,
            started: false,
        }
    }

    pub fn status(&self) -> LeadershipStatus {
        LeadershipStatus::new(self.state_tx.subscribe())
    }

    pub fn config(&self) -> &LeaderConfig {
        self.manager.config()
    }

    /// Acquire the lease per the configured wait policy and, on success,
    /// start the heartbeat. Acquisition is never re-entered: later calls
    /// report the first call's lease if it is still held.
    pub async fn start(&mut self) -> StartOutcome {
        if self.started {
            return match &self.running {
                Some(running) if self.state_tx.borrow().is_leader() => {
                    StartOutcome::Leader(running.handle.clone())
                }
                _ => StartOutcome::Failed(LockError::AlreadyStarted),
            };
        }
        self.started = true;
        self.state_tx.send_replace(LeadershipState::Acquiring);

        let handle = match self.manager.acquire().await {
            Ok(handle) => handle,
            Err(LockError::LeaseHeld { holder }) => {
                self.state_tx.send_replace(LeadershipState::NotLeader);
                return StartOutcome::NotLeader { holder };
            }
            Err(e) => {
                self.state_tx.send_replace(LeadershipState::Failed);
                return StartOutcome::Failed(e);
            }
        };

        self.state_tx.send_replace(LeadershipState::Leader {
            expires_at: handle.expires_at,
        });

        let config = self.manager.config();
        let renewer = HeartbeatRenewer {
            store: self.manager.store(),
            clock: self.manager.clock(),
            service_id: config.service_id.clone(),
            identity: config.identity.clone(),
            lease: config.lease_delta(),
            interval: config.heartbeat_interval(),
            last_expiry: handle.expires_at,
            state_tx: self.state_tx.clone(),
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let renewer = renewer.start(shutdown_rx);

        self.running = Some(Running {
            handle: handle.clone(),
            shutdown_tx,
            renewer,
        });
        StartOutcome::Leader(handle)
    }

    /// Stop the heartbeat and release the lease if it is still ours.
    /// Best effort and idempotent; a failed release is logged, never fatal.
    pub async fn shutdown(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.shutdown_tx.send_replace(true);
        let exit = match running.renewer.await {
            Ok(exit) => exit,
            Err(e) => {
                error!("Heartbeat task failed: {}", e);
                RenewerExit::Shutdown
            }
        };

        if exit == RenewerExit::Lost
            || *self.state_tx.borrow() == LeadershipState::LostLeadership
        {
            info!(
                "Not releasing lease {}: leadership was already lost",
                running.handle.service_id
            );
            return;
        }

        let id = running.handle.service_id.as_str();
        let owner = running.handle.owner.as_str();
        match self
            .manager
            .store()
            .delete_if(id, &LeasePredicate::owned_by(owner))
            .await
        {
            Ok(true) => info!(service_id = id, owner, "Lease released"),
            Ok(false) => warn!(
                service_id = id,
                owner,
                "Lease was no longer ours at release; left untouched"
            ),
            Err(e) => warn!(
                service_id = id,
                owner,
                error = %e,
                "Failed to release lease; it will expire on its own"
            ),
        }
        self.state_tx.send_replace(LeadershipState::Released);
    }
}

// ─── Tests ─────────────────────────────────────────────────────
