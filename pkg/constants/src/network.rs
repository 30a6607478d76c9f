//! Network-related constants.

/// Default port for the bot's health endpoint.
pub const DEFAULT_HEALTH_PORT: u16 = 5000;

/// Default port for the lease server API.
pub const DEFAULT_LEASED_PORT: u16 = 7070;

/// Timeout for a single lease store request, in seconds.
pub const LEASE_STORE_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Base URL of the Telegram Bot API.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Long-poll timeout passed to `getUpdates`, in seconds.
pub const UPDATE_POLL_TIMEOUT_SECS: u64 = 30;

/// Delay before polling again after a transport failure, in seconds.
pub const UPDATE_RETRY_DELAY_SECS: u64 = 5;
