//! Lease store / leader lock constants.

/// Key prefix under which lease records are stored in the state store.
/// Full key = `LEASE_KEY_PREFIX + service_id`.
pub const LEASE_KEY_PREFIX: &str = "/registry/leases/";

/// Default logical service identity (the lease `id`).
pub const DEFAULT_SERVICE_ID: &str = "solo-bot";

/// Service ids that clash with lease server routes.
pub const RESERVED_SERVICE_IDS: &[&str] = &["purge"];

/// How long a lease is valid before it is considered stale, in seconds.
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 60;

/// The lease is renewed every `lease / HEARTBEAT_INTERVAL_DIVISOR`.
/// Must keep the interval at or below 0.4 of the lease.
pub const HEARTBEAT_INTERVAL_DIVISOR: u32 = 3;

/// Lower bound for the heartbeat interval, in milliseconds.
pub const HEARTBEAT_INTERVAL_FLOOR_MS: u64 = 1_000;

/// Base of the jittered backoff between blocking acquisition rounds, in milliseconds.
/// The actual sleep is uniform in `[0.5, 1.5] × base`.
pub const ACQUIRE_BACKOFF_BASE_MS: u64 = 500;

/// Ceiling for a single backoff sleep, in milliseconds.
pub const ACQUIRE_BACKOFF_CEILING_MS: u64 = 1_000;

/// How many times a single attempt is retried on a transient store error.
pub const TRANSIENT_RETRIES: u32 = 3;

/// Fixed delay between transient-error retries, in milliseconds.
pub const TRANSIENT_RETRY_DELAY_MS: u64 = 1_000;

/// How often the lease server purges expired records, in seconds.
pub const EXPIRY_SWEEP_INTERVAL_SECS: u64 = 5;
