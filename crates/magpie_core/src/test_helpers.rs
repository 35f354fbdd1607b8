//! Shared helpers for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::DateTime;

use crate::config::{BotConfig, ReplyRules};
use crate::error::{CoreError, Result};
use crate::message::ChatEvent;
use crate::transport::ChatTransport;

/// Parse and compile a rule document, panicking on errors.
pub fn rules_from_json(json: &str) -> ReplyRules {
    BotConfig::from_json(json)
        .expect("test rules parse")
        .compile()
        .expect("test rules compile")
}

/// Build a chat event with a second-resolution timestamp.
pub fn event_at(
    sender_id: &str,
    sender_name: &str,
    conversation_id: &str,
    body: &str,
    timestamp_secs: i64,
) -> ChatEvent {
    ChatEvent {
        event_id: format!("e{timestamp_secs}"),
        conversation_id: conversation_id.to_string(),
        sender_id: sender_id.to_string(),
        sender_name: sender_name.to_string(),
        timestamp: DateTime::from_timestamp(timestamp_secs, 0).expect("valid timestamp"),
        body: body.to_string(),
    }
}

/// Scripted in-memory transport: records sends, serves queued history
/// pages, and can fail on demand.
#[derive(Default)]
pub struct ScriptedTransport {
    sent: parking_lot::Mutex<Vec<(String, String)>>,
    pages: parking_lot::Mutex<VecDeque<Vec<ChatEvent>>>,
    history_requests: AtomicUsize,
    disconnects: AtomicUsize,
    fail_send: AtomicBool,
    fail_history: AtomicBool,
}

impl ScriptedTransport {
    /// Everything sent so far, as `(conversation_id, body)` pairs.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    /// Queue one history page; pages are served in push order and an
    /// exhausted queue serves empty pages.
    pub fn push_history_page(&self, page: Vec<ChatEvent>) {
        self.pages.lock().push_back(page);
    }

    pub fn history_requests(&self) -> usize {
        self.history_requests.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Fail the next send with a network error.
    pub fn fail_next_send(&self) {
        self.fail_send.store(true, Ordering::SeqCst);
    }

    /// Fail the next history fetch with a network error.
    pub fn fail_next_history(&self) {
        self.fail_history.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send_message(&self, conversation_id: &str, body: &str) -> Result<()> {
        if self.fail_send.swap(false, Ordering::SeqCst) {
            return Err(CoreError::network("send", "scripted failure"));
        }
        self.sent
            .lock()
            .push((conversation_id.to_string(), body.to_string()));
        Ok(())
    }

    async fn fetch_history(
        &self,
        _conversation_id: &str,
        _before: Option<String>,
        _limit: usize,
    ) -> Result<Vec<ChatEvent>> {
        self.history_requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_history.swap(false, Ordering::SeqCst) {
            return Err(CoreError::network("history", "scripted failure"));
        }
        Ok(self.pages.lock().pop_front().unwrap_or_default())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
