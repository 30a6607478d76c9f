use chrono::Utc;
use pkg_constants::bot::{MONTHLY_WINDOW_DAYS, WEEKLY_WINDOW_DAYS};
use pkg_types::activity::ActivityAction;
use pkg_types::contact::{ContactRequest, RequestStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::activity::ActivityLog;
use crate::messages;
use crate::transport::{ChatTransport, ChatUser, IncomingMessage, TransportError};

/// Per-user conversation state. Users without an entry are idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserState {
    /// Asked for contact details; the next text is the request.
    AwaitingDetails,
}

/// Settings the conversation needs from the binary.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Chat receiving contact-request notifications and allowed to `/stats`
    pub owner_chat_id: Option<i64>,
    pub whatsapp_number: String,
}

/// What an incoming text asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Start,
    Help,
    Stats,
    WhatsApp,
    ServiceInfo,
    CallMeBack,
    Other,
}

fn classify(text: &str) -> Intent {
    let text = text.trim();
    if let Some(command) = text.strip_prefix('/') {
        // "/start@my_bot args" → "start"
        let name = command
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default();
        return match name {
            "start" => Intent::Start,
            "help" => Intent::Help,
            "stats" => Intent::Stats,
            _ => Intent::Other,
        };
    }
    match text {
        messages::BUTTON_WHATSAPP => Intent::WhatsApp,
        messages::BUTTON_SERVICE_INFO => Intent::ServiceInfo,
        messages::BUTTON_CALL_ME_BACK => Intent::CallMeBack,
        _ => Intent::Other,
    }
}

/// Handles one message at a time and remembers who is mid-request.
pub struct Conversation {
    transport: Arc<dyn ChatTransport>,
    activity: ActivityLog,
    config: ConversationConfig,
    states: HashMap<i64, UserState>,
}

impl Conversation {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        activity: ActivityLog,
        config: ConversationConfig,
    ) -> Self {
        Self {
            transport,
            activity,
            config,
            states: HashMap::new(),
        }
    }

    pub fn state_of(&self, user_id: i64) -> Option<UserState> {
        self.states.get(&user_id).copied()
    }

    /// Reply to `msg`. Only the reply to the sender can fail the call;
    /// bookkeeping and operator notification failures are logged.
    pub async fn handle(&mut self, msg: &IncomingMessage) -> Result<(), TransportError> {
        let (Some(user), Some(text)) = (msg.from.as_ref(), msg.text.as_deref()) else {
            return Ok(());
        };
        let chat_id = msg.chat.id;
        let keyboard = messages::main_keyboard();
        let intent = classify(text);

        // Commands always win; any other text completes a pending request.
        let awaiting = self.states.get(&user.id) == Some(&UserState::AwaitingDetails);
        if awaiting && !text.trim_start().starts_with('/') {
            // Saved and forwarded before the reply, so a failed reply cannot drop it.
            self.complete_request(user, msg, text).await;
            self.record(user.id, ActivityAction::ContactDetails).await;
            self.states.remove(&user.id);
            self.transport
                .send_message(chat_id, messages::REQUEST_RECEIVED, Some(&keyboard))
                .await?;
            return Ok(());
        }

        let action = match intent {
            Intent::Start => {
                self.states.remove(&user.id);
                info!("User {} ({}) started a conversation", user.full_name(), user.id);
                self.transport
                    .send_message(chat_id, messages::WELCOME, Some(&keyboard))
                    .await?;
                ActivityAction::Start
            }
            Intent::Help => {
                self.transport
                    .send_message(chat_id, messages::HELP, Some(&keyboard))
                    .await?;
                ActivityAction::Help
            }
            Intent::Stats if self.config.owner_chat_id == Some(chat_id) => {
                let reply = self.stats_text().await;
                self.transport.send_message(chat_id, &reply, None).await?;
                ActivityAction::Stats
            }
            Intent::WhatsApp => {
                let reply = messages::whatsapp_message(&self.config.whatsapp_number);
                self.transport
                    .send_message(chat_id, &reply, Some(&keyboard))
                    .await?;
                ActivityAction::WhatsApp
            }
            Intent::ServiceInfo => {
                self.transport
                    .send_message(chat_id, messages::SERVICE_INFO, Some(&keyboard))
                    .await?;
                ActivityAction::ServiceInfo
            }
            Intent::CallMeBack => {
                self.states.insert(user.id, UserState::AwaitingDetails);
                self.transport
                    .send_message(chat_id, messages::CONTACT_PROMPT, Some(&keyboard))
                    .await?;
                ActivityAction::CallbackRequest
            }
            Intent::Stats | Intent::Other => {
                self.transport
                    .send_message(chat_id, messages::DEFAULT_REPLY, Some(&keyboard))
                    .await?;
                ActivityAction::Message
            }
        };
        self.record(user.id, action).await;
        Ok(())
    }

    async fn complete_request(&self, user: &ChatUser, msg: &IncomingMessage, text: &str) {
        let sent_at = msg.sent_at();
        let full_name = user.full_name();

        match self.config.owner_chat_id {
            Some(owner) => {
                let note = messages::notification(
                    &full_name,
                    user.username.as_deref(),
                    user.id,
                    text,
                    sent_at,
                );
                if let Err(e) = self.transport.send_message(owner, &note, None).await {
                    error!("Failed to notify operator about request from {}: {}", user.id, e);
                }
            }
            None => warn!(
                "Contact request from {} not forwarded: no operator chat configured",
                user.id
            ),
        }

        let request = ContactRequest {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.id,
            username: user.username.clone(),
            full_name,
            message_text: text.to_string(),
            status: RequestStatus::Pending,
            created_at: sent_at,
        };
        if let Err(e) = self.activity.save_request(&request).await {
            error!("Failed to save contact request from {}: {}", user.id, e);
        }
    }

    async fn stats_text(&self) -> String {
        let now = Utc::now();
        let weekly = self.activity.report(WEEKLY_WINDOW_DAYS, now).await;
        let monthly = self.activity.report(MONTHLY_WINDOW_DAYS, now).await;
        match (weekly, monthly) {
            (Ok(weekly), Ok(monthly)) => messages::stats(&weekly, &monthly),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to build activity report: {}", e);
                messages::STATS_UNAVAILABLE.to_string()
            }
        }
    }

    async fn record(&self, user_id: i64, action: ActivityAction) {
        if let Err(e) = self.activity.record(user_id, action, Utc::now()).await {
            warn!("Failed to record activity for {}: {}", user_id, e);
        }
    }
}

// ─── Tests ─────────────────────────────────────────────────────
