//! Environment variable names read by the binaries.

// ─── Leader lock ───────────────────────────────────────────────────────────

pub const SERVICE_ID: &str = "SERVICE_ID";
pub const INSTANCE_ID: &str = "SOLO_INSTANCE_ID";

/// Instance id injected by the hosting platform (Render).
pub const PLATFORM_INSTANCE_ID: &str = "RENDER_INSTANCE_ID";

pub const LEASE_DURATION_SECS: &str = "SOLO_LEASE_DURATION_SECS";
pub const WAIT_FOR_LEASE: &str = "SOLO_WAIT_FOR_LEASE";
pub const MAX_WAIT_SECS: &str = "SOLO_MAX_WAIT_SECS";
pub const LEASE_STORE_URL: &str = "SOLO_LEASE_STORE_URL";
pub const LEASE_STORE_TOKEN: &str = "SOLO_LEASE_STORE_TOKEN";

// ─── Bot ───────────────────────────────────────────────────────────────────

pub const BOT_TOKEN: &str = "BOT_TOKEN";
pub const OWNER_CHAT_ID: &str = "OWNER_CHAT_ID";
pub const WHATSAPP_NUMBER: &str = "WHATSAPP_NUMBER";
pub const PORT: &str = "PORT";
pub const BOT_DATA_DIR: &str = "SOLO_DATA_DIR";
pub const CONFIG_PATH: &str = "SOLO_CONFIG";

// ─── Logging ───────────────────────────────────────────────────────────────

/// `json` or `text`.
pub const LOG_FORMAT: &str = "LOG_FORMAT";

// ─── Lease server ──────────────────────────────────────────────────────────

pub const LEASED_PORT: &str = "SOLO_LEASED_PORT";
pub const LEASED_DATA_DIR: &str = "SOLO_LEASED_DATA_DIR";
pub const LEASED_TOKEN: &str = "SOLO_LEASED_TOKEN";
