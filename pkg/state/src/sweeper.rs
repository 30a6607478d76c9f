use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::store::LeaseStore;

/// Background task that removes expired lease records.
///
/// This is the safety net for holders that crashed without releasing:
/// their record disappears once its deadline passes, even if no other
/// instance ever tries to take it over.
pub struct ExpirySweeper {
    store: Arc<dyn LeaseStore>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn LeaseStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Start the sweep loop as a background task. It exits when `shutdown`
    /// flips to `true` or its sender is dropped.
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "ExpirySweeper started (interval={}s)",
                self.interval.as_secs()
            );
            let mut interval = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                match self.store.purge_expired(Utc::now()).await {
                    Ok(0) => {}
                    Ok(n) => info!("ExpirySweeper removed {} expired lease(s)", n),
                    Err(e) => warn!("ExpirySweeper purge error: {}", e),
                }
            }
            info!("ExpirySweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLeaseStore;
    use chrono::Duration as ChronoDuration;
    use pkg_types::lease::LeaseRecord;

    #[tokio::test]
    async fn test_sweeper_purges_and_stops() {
        let store = MemoryLeaseStore::new();
        let now = Utc::now();
        store
            .put_record(LeaseRecord::new(
                "svc-stale",
                "a",
                "a-host",
                now - ChronoDuration::seconds(120),
                now - ChronoDuration::seconds(60),
            ))
            .await;
        store
            .put_record(LeaseRecord::new(
                "svc-live",
                "b",
                "b-host",
                now,
                now + ChronoDuration::seconds(600),
            ))
            .await;

        let (tx, rx) = watch::channel(false);
        let handle = ExpirySweeper::new(Arc::new(store.clone()), Duration::from_millis(20)).start(rx);

        // The first tick fires immediately.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.len().await, 1);
        assert!(store.get("svc-live").await.unwrap().is_some());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop on shutdown")
            .unwrap();
    }
}
