//! Chat bot constants.

/// Default WhatsApp number offered in the contact menu.
pub const DEFAULT_WHATSAPP_NUMBER: &str = "+972543978620";

/// Key prefix for activity records. Full key =
/// `ACTIVITY_KEY_PREFIX + service_id + "/" + timestamp + "-" + user_id`.
pub const ACTIVITY_KEY_PREFIX: &str = "/activity/";

/// Key prefix for saved contact requests.
pub const CONTACT_REQUEST_KEY_PREFIX: &str = "/requests/";

/// Activity older than this many days is removed by cleanup.
pub const ACTIVITY_RETENTION_DAYS: i64 = 90;

/// Reporting windows, in days.
pub const WEEKLY_WINDOW_DAYS: i64 = 7;
pub const MONTHLY_WINDOW_DAYS: i64 = 30;
