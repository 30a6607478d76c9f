use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    /// The bot token was refused.
    #[error("unauthorized: bot token rejected")]
    Unauthorized,
    #[error("api error {code}: {description}")]
    Api { code: i64, description: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl ChatUser {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<ChatUser>,
    pub chat: Chat,
    /// Unix seconds
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
}

impl IncomingMessage {
    pub fn sent_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.date, 0).unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

/// Persistent reply keyboard shown under the input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<String>>,
}

impl Keyboard {
    fn to_markup(&self) -> serde_json::Value {
        let keyboard: Vec<Vec<serde_json::Value>> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|text| serde_json::json!({ "text": text }))
                    .collect()
            })
            .collect();
        serde_json::json!({
            "keyboard": keyboard,
            "resize_keyboard": true,
            "one_time_keyboard": false,
        })
    }
}

/// The inbound/outbound chat capability. Implementations fail with
/// [`TransportError`] on network or auth problems; callers decide whether
/// to retry.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Long-poll for updates with id `>= offset`.
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, TransportError>;

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError>;

    /// Drop the backlog accumulated while no leader was polling.
    /// Returns the offset to poll from next.
    async fn skip_pending(&self) -> Result<Option<i64>, TransportError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API over HTTPS.
#[derive(Clone)]
pub struct TelegramTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramTransport {
    pub fn new(api_base: &str, token: impl Into<String>, poll_timeout: Duration) -> anyhow::Result<Self> {
        // Long polls hold the request open for `poll_timeout`.
        let client = reqwest::Client::builder()
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, TransportError> {
        // The token is part of the URL; never log the URL itself.
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.without_url().to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::Unauthorized);
        }
        let parsed: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| TransportError::Network(e.without_url().to_string()))?;
        match parsed {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            other => Err(TransportError::Api {
                code: other.error_code.unwrap_or(i64::from(status.as_u16())),
                description: other
                    .description
                    .unwrap_or_else(|| format!("{} failed", method)),
            }),
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, TransportError> {
        let mut body = serde_json::json!({
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = serde_json::json!(offset);
        }
        self.call("getUpdates", &body).await
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = keyboard.to_markup();
        }
        let _: serde_json::Value = self.call("sendMessage", &body).await?;
        Ok(())
    }

    async fn skip_pending(&self) -> Result<Option<i64>, TransportError> {
        let body = serde_json::json!({ "offset": -1, "timeout": 0 });
        let last: Vec<Update> = self.call("getUpdates", &body).await?;
        let next = last.last().map(|u| u.update_id + 1);
        if let Some(next) = next {
            debug!("Skipping pending updates, next offset {}", next);
        }
        Ok(next)
    }
}

// ─── Tests ─────────────────────────────────────────────────────
