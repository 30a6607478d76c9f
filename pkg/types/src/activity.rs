use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// What a user did. Recorded once per handled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Start,
    Help,
    WhatsApp,
    ServiceInfo,
    CallbackRequest,
    ContactDetails,
    Stats,
    Message,
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActivityAction::Start => "start",
            ActivityAction::Help => "help",
            ActivityAction::WhatsApp => "whatsapp",
            ActivityAction::ServiceInfo => "service_info",
            ActivityAction::CallbackRequest => "callback_request",
            ActivityAction::ContactDetails => "contact_details",
            ActivityAction::Stats => "stats",
            ActivityAction::Message => "message",
        };
        write!(f, "{}", s)
    }
}

/// One user interaction, stored under `/activity/<service_id>/...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub user_id: i64,
    pub service_id: String,
    pub action: ActivityAction,
    pub timestamp: DateTime<Utc>,
    /// UTC calendar day of `timestamp`, used for the daily breakdown
    pub date: NaiveDate,
}

impl ActivityRecord {
    pub fn new(
        user_id: i64,
        service_id: impl Into<String>,
        action: ActivityAction,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            service_id: service_id.into(),
            action,
            timestamp,
            date: timestamp.date_naive(),
        }
    }
}

/// Per-day counts inside a report window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub unique_users: usize,
    pub total_activities: usize,
}

/// Usage summary over the last `window_days` days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityReport {
    pub window_days: i64,
    pub unique_users: usize,
    pub total_activities: usize,
    /// Newest day first
    pub daily_breakdown: Vec<DailyActivity>,
}
