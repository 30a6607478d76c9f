use chrono::{DateTime, Utc};
use pkg_state::LeaseStore;
use pkg_types::lease::{LeasePredicate, LeaseUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::identity::InstanceIdentity;
use crate::status::{LeadershipState, stop_requested};

/// Why the renewer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenewerExit {
    Shutdown,
    Lost,
}

/// Keeps a held lease alive. One per successful acquisition.
pub(crate) struct HeartbeatRenewer {
    pub(crate) store: Arc<dyn LeaseStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) service_id: String,
    pub(crate) identity: InstanceIdentity,
    pub(crate) lease: chrono::Duration,
    pub(crate) interval: Duration,
    /// Last `expiresAt` the store confirmed for us
    pub(crate) last_expiry: DateTime<Utc>,
    pub(crate) state_tx: watch::Sender<LeadershipState>,
}

enum Beat {
    Renewed,
    Failed,
    Lost(&'static str),
}

impl HeartbeatRenewer {
    /// Run the renewal loop until `shutdown` flips to `true` or the lease is lost.
    pub(crate) fn start(mut self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<RenewerExit> {
        tokio::spawn(async move {
            info!(
                "Heartbeat started for lease {} (owner={}, interval={}ms)",
                self.service_id,
                self.identity,
                self.interval.as_millis()
            );
            let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let expiry = self.expiry_deadline();
                tokio::select! {
                    biased;
                    _ = stop_requested(&mut shutdown) => break,
                    _ = tokio::time::sleep_until(expiry) => {
                        return self.lose("lease expired before it could be renewed");
                    }
                    _ = ticker.tick() => {}
                }

                // A renewal stuck in the store must not outlive the lease.
                let beat = tokio::select! {
                    biased;
                    _ = stop_requested(&mut shutdown) => break,
                    _ = tokio::time::sleep_until(expiry) => {
                        Beat::Lost("lease expired while a renewal was in flight")
                    }
                    beat = self.beat() => beat,
                };

                if let Beat::Lost(reason) = beat {
                    return self.lose(reason);
                }
            }

            info!("Heartbeat stopped for lease {}", self.service_id);
            RenewerExit::Shutdown
        })
    }

    /// `last_expiry` on tokio's timeline.
    fn expiry_deadline(&self) -> Instant {
        let left = (self.last_expiry - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        Instant::now() + left
    }

    fn lose(&self, reason: &str) -> RenewerExit {
        self.state_tx.send_replace(LeadershipState::LostLeadership);
        error!(
            service_id = %self.service_id,
            owner = %self.identity,
            last_expiry = %self.last_expiry,
            "Leadership lost: {}",
            reason
        );
        RenewerExit::Lost
    }

    async fn beat(&mut self) -> Beat {
        let now = self.clock.now();
        let update = LeaseUpdate {
            owner: self.identity.instance_id.clone(),
            host: self.identity.host.clone(),
            updated_at: now,
            expires_at: now + self.lease,
        };
        let predicate = LeasePredicate::owned_by(self.identity.instance_id.clone());

        match self
            .store
            .find_and_update_if(&self.service_id, &predicate, &update)
            .await
        {
            Ok(Some(updated)) => {
                self.last_expiry = updated.record.expires_at;
                self.state_tx.send_replace(LeadershipState::Leader {
                    expires_at: self.last_expiry,
                });
                debug!(
                    "Renewed lease {} until {}",
                    self.service_id, self.last_expiry
                );
                Beat::Renewed
            }
            Ok(None) => Beat::Lost("lease is no longer ours"),
            Err(e) => {
                warn!(
                    service_id = %self.service_id,
                    owner = %self.identity,
                    error = %e,
                    "Heartbeat failed, retrying next tick"
                );
                if self.clock.now() >= self.last_expiry {
                    return Beat::Lost("lease expired while renewals were failing");
                }
                Beat::Failed
            }
        }
    }
}

// ─── Tests ─────────────────────────────────────────────────────
