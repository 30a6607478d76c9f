//! Singleton leadership over a shared lease store.
//!
//! Exactly one process per service identity may hold the lease at a time.
//! [`LeaderLifecycle`] is the only entry point the rest of an application
//! needs: `start()` once, read [`LeadershipStatus`], and call `shutdown()`
//! on every exit path.

pub mod clock;
pub mod config;
pub mod error;
mod heartbeat;
pub mod identity;
pub mod lifecycle;
pub mod manager;
pub mod status;

pub use clock::{Clock, SystemClock, TokioClock};
pub use config::{LeaderConfig, WaitPolicy};
pub use error::LockError;
pub use identity::InstanceIdentity;
pub use lifecycle::{LeaderLifecycle, StartOutcome};
pub use manager::{AcquireKind, AttemptOutcome, LeaseHandle, LockManager};
pub use status::{LeadershipState, LeadershipStatus, stop_requested};
