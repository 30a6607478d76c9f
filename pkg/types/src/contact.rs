use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Handled,
}

/// A "call me back" request left by a user and forwarded to the operator.
/// Stored at `/requests/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub id: String,
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub full_name: String,
    pub message_text: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}
