//! Filesystem path constants.

/// Default config file path for the bot.
pub const DEFAULT_BOT_CONFIG: &str = "/etc/solo/bot.yaml";

/// Default data directory for the bot's activity store.
pub const DEFAULT_BOT_DATA_DIR: &str = "/tmp/solo-bot-data";

/// Default config file path for the lease server.
pub const DEFAULT_LEASED_CONFIG: &str = "/etc/solo/leased.yaml";

/// Default data directory for the lease server's state store.
pub const DEFAULT_LEASED_DATA_DIR: &str = "/tmp/solo-leased-data";
