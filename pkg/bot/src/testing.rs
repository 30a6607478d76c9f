use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::transport::{Chat, ChatTransport, ChatUser, IncomingMessage, Keyboard, TransportError, Update};

#[derive(Debug, Clone)]
pub struct Sent {
    pub chat_id: i64,
    pub text: String,
    pub with_keyboard: bool,
}

/// In-memory transport: scripted update batches in, recorded messages out.
#[derive(Default)]
pub struct FakeTransport {
    batches: Mutex<VecDeque<Result<Vec<Update>, TransportError>>>,
    sent: Mutex<Vec<Sent>>,
    failing_chats: Mutex<HashSet<i64>>,
    polls: Mutex<usize>,
}

impl FakeTransport {
    pub fn push_batch(&self, batch: Result<Vec<Update>, TransportError>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn fail_chat(&self, chat_id: i64) {
        self.failing_chats.lock().unwrap().insert(chat_id);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn polls(&self) -> usize {
        *self.polls.lock().unwrap()
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn get_updates(
        &self,
        _offset: Option<i64>,
        _timeout: Duration,
    ) -> Result<Vec<Update>, TransportError> {
        *self.polls.lock().unwrap() += 1;
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        if self.failing_chats.lock().unwrap().contains(&chat_id) {
            return Err(TransportError::Network("chat unreachable".to_string()));
        }
        self.sent.lock().unwrap().push(Sent {
            chat_id,
            text: text.to_string(),
            with_keyboard: keyboard.is_some(),
        });
        Ok(())
    }

    async fn skip_pending(&self) -> Result<Option<i64>, TransportError> {
        Ok(None)
    }
}

/// A private-chat text message from user `chat_id`.
pub fn message(chat_id: i64, text: &str) -> IncomingMessage {
    IncomingMessage {
        message_id: 1,
        from: Some(ChatUser {
            id: chat_id,
            first_name: format!("User {}", chat_id),
            last_name: None,
            username: Some(format!("user{}", chat_id)),
        }),
        chat: Chat { id: chat_id },
        date: 1_772_700_000,
        text: Some(text.to_string()),
    }
}

pub fn update(update_id: i64, chat_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(message(chat_id, text)),
    }
}
