use pkg_leader::{LeadershipStatus, stop_requested};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::conversation::Conversation;
use crate::transport::{ChatTransport, TransportError};

/// Why the dispatcher returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchExit {
    Shutdown,
    /// This process is no longer the leader.
    SteppedDown,
}

/// Long-polls the chat transport and feeds every message to the
/// conversation, but only while this process holds leadership.
pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    conversation: Conversation,
    status: LeadershipStatus,
    poll_timeout: Duration,
    retry_delay: Duration,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        conversation: Conversation,
        status: LeadershipStatus,
        poll_timeout: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            transport,
            conversation,
            status,
            poll_timeout,
            retry_delay,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> DispatchExit {
        if !self.status.is_leader() {
            warn!("Dispatcher not started: this instance is not the leader");
            return DispatchExit::SteppedDown;
        }

        let mut offset = match self.transport.skip_pending().await {
            Ok(offset) => offset,
            Err(e) => {
                warn!("Could not skip pending updates: {}", e);
                None
            }
        };
        info!("Dispatcher started");

        loop {
            let polled = tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => return DispatchExit::Shutdown,
                _ = self.status.stepped_down() => return self.stepped_down(),
                polled = self.transport.get_updates(offset, self.poll_timeout) => polled,
            };

            let batch = match polled {
                Ok(batch) => batch,
                Err(e) => {
                    match &e {
                        TransportError::Unauthorized => error!("Polling failed: {}", e),
                        _ => warn!(
                            "Polling failed: {}, retrying in {}s",
                            e,
                            self.retry_delay.as_secs()
                        ),
                    }
                    tokio::select! {
                        biased;
                        _ = stop_requested(&mut shutdown) => return DispatchExit::Shutdown,
                        _ = self.status.stepped_down() => return self.stepped_down(),
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                    continue;
                }
            };

            for update in batch {
                // A lost lease means another instance may already be answering.
                if !self.status.is_leader() {
                    return self.stepped_down();
                }
                offset = Some(update.update_id + 1);
                let Some(message) = update.message else {
                    continue;
                };
                if let Err(e) = self.conversation.handle(&message).await {
                    warn!("Failed to reply in chat {}: {}", message.chat.id, e);
                }
            }
        }
    }

    fn stepped_down(&self) -> DispatchExit {
        warn!(
            "Dispatcher stopping: leadership is {}",
            self.status.state()
        );
        DispatchExit::SteppedDown
    }
}

// ─── Tests ─────────────────────────────────────────────────────
