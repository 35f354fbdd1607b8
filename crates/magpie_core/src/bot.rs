//! Bot runtime: event dispatch, self-echo suppression, the send pipeline,
//! and the startup history backfill.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::command::{self, AdminAction};
use crate::config::{ReplyRules, LOG_CONVERSATION};
use crate::error::Result;
use crate::history::HistoryStore;
use crate::message::ChatEvent;
use crate::reply::ReplyEngine;
use crate::status::StatusMap;
use crate::transport::ChatTransport;

/// Outbound bodies remembered for self-echo suppression.
const ECHO_BUFFER_CAPACITY: usize = 64;
/// Cap on concurrently running event handlers; further inbound events
/// wait instead of spawning.
const MAX_IN_FLIGHT_HANDLERS: usize = 64;
/// Events requested per backfill page.
const BACKFILL_BATCH: usize = 2500;

/// The bot runtime.
///
/// Everything here runs on the shared tokio runtime; the two exclusive
/// sections are the send lock (which also guards the echo buffer) and the
/// archive file lock inside [`HistoryStore`].
pub struct Bot {
    transport: Arc<dyn ChatTransport>,
    rules: Arc<ReplyRules>,
    engine: ReplyEngine,
    history: Arc<HistoryStore>,
    status: parking_lot::Mutex<StatusMap>,
    /// Recently sent bodies. Shares its lock with the physical send so an
    /// inbound echo cannot race a send in progress.
    recent_sent: Mutex<VecDeque<String>>,
    handler_permits: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
}

impl Bot {
    pub fn new(rules: ReplyRules, transport: Arc<dyn ChatTransport>) -> Arc<Self> {
        let rules = Arc::new(rules);
        let status = parking_lot::Mutex::new(StatusMap::for_rules(&rules));
        let history = Arc::new(HistoryStore::new(rules.history_file.clone()));
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            transport,
            engine: ReplyEngine::new(rules.clone()),
            rules,
            history,
            status,
            recent_sent: Mutex::new(VecDeque::new()),
            handler_permits: Arc::new(Semaphore::new(MAX_IN_FLIGHT_HANDLERS)),
            shutdown_tx,
        })
    }

    /// Receiver that flips to `true` once `quit` ran.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn rules(&self) -> &ReplyRules {
        &self.rules
    }

    /// Entry point for every inbound transport event.
    ///
    /// Discards self-echoes and events from conversations the bot does
    /// not reply to, then hands the rest to a bounded pool of
    /// fire-and-forget handler tasks so a slow reply never blocks the
    /// next event.
    pub async fn handle_event(self: &Arc<Self>, event: ChatEvent) {
        {
            let mut recent = self.recent_sent.lock().await;
            if let Some(position) = recent.iter().position(|body| *body == event.body) {
                recent.remove(position);
                debug!(conversation = %event.conversation_id, "discarded self-echo");
                return;
            }
        }

        if !self.rules.conversation_reply_to(&event.conversation_id) {
            return;
        }

        let Ok(permit) = self.handler_permits.clone().acquire_owned().await else {
            return;
        };
        let bot = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            bot.process_event(&event).await;
        });
    }

    /// The full handling pipeline for one event: public commands, admin
    /// commands, notify forwarding, then the auto-reply engine. Each stage
    /// fails independently; a failed stage is logged and skipped.
    pub(crate) async fn process_event(&self, event: &ChatEvent) {
        match command::run_public(&event.body, &self.history, &self.status).await {
            Ok(Some(messages)) => self.send_messages(&event.conversation_id, &messages).await,
            Ok(None) => {}
            Err(error) => warn!(%error, "history command failed"),
        }

        if self.rules.user_is_admin(&event.sender_id) {
            match command::run_admin(&event.body, &self.engine, &self.history, &self.status).await
            {
                Ok(Some(AdminAction::Replies(messages))) => self.send_to_log(&messages).await,
                Ok(Some(AdminAction::Quit)) => {
                    self.quit().await;
                    return;
                }
                Ok(None) => {}
                Err(error) => warn!(%error, "admin command failed"),
            }
        }

        // sending a reply marks the conversation as read, so the notify
        // keyword gives people a way to reach the operator anyway
        if !self.rules.notify_keyword.is_empty()
            && event.body.to_lowercase().contains(&self.rules.notify_keyword)
        {
            let notice = format!("message from {}: {}", event.sender_name, event.body);
            self.send_to_log(&[notice]).await;
        }

        let (active, snapshot) = {
            let status = self.status.lock();
            (status.is_active(), status.clone())
        };
        if active && self.rules.user_reply_to(&event.sender_id) {
            match self
                .engine
                .classify_and_reply(&event.body, &snapshot, &self.history)
                .await
            {
                Ok(replies) => self.send_messages(&event.conversation_id, &replies).await,
                Err(error) => warn!(%error, "reply selection failed"),
            }
        }
    }

    /// Send messages one at a time to a conversation (name or id),
    /// recording each body for echo suppression. A network failure logs
    /// and abandons the remainder of this send only.
    pub async fn send_messages(&self, conversation: &str, messages: &[String]) {
        if messages.is_empty() {
            return;
        }
        let conversation_id = self.rules.resolve_conversation(conversation);
        let mut recent = self.recent_sent.lock().await;
        for message in messages {
            if let Err(error) = self.transport.send_message(&conversation_id, message).await {
                warn!(%error, conversation = %conversation_id, "error when sending messages");
                return;
            }
            recent.push_back(message.clone());
            while recent.len() > ECHO_BUFFER_CAPACITY {
                recent.pop_front();
            }
        }
    }

    async fn send_to_log(&self, messages: &[String]) {
        self.send_messages(LOG_CONVERSATION, messages).await;
    }

    /// Kick off the startup backfill: one background task per eligible
    /// conversation, concurrent with normal event handling.
    pub fn spawn_history_backfill(self: &Arc<Self>) {
        for (name, conversation) in self.rules.load_history_conversations() {
            let bot = self.clone();
            let name = name.clone();
            let conversation_id = conversation.id.clone();
            tokio::spawn(async move {
                match bot.backfill_conversation(&name, &conversation_id).await {
                    Ok(count) => info!(conversation = %name, lines = count, "history loaded"),
                    Err(error) => {
                        warn!(%error, conversation = %name, "error when getting history");
                    }
                }
            });
        }
    }

    /// Page a conversation's history backwards and write the archive.
    ///
    /// The transport's paging wraps around once the history is exhausted,
    /// so the loop stops when a batch's earliest timestamp no longer
    /// precedes the previously seen earliest.
    pub(crate) async fn backfill_conversation(
        &self,
        name: &str,
        conversation_id: &str,
    ) -> Result<usize> {
        let mut lines: Vec<String> = Vec::new();
        let mut before: Option<String> = None;
        let mut earliest: Option<DateTime<Utc>> = None;
        let mut batch_count = 0usize;
        loop {
            batch_count += 1;
            debug!(conversation = %name, batch = batch_count, "getting history batch");
            let batch = self
                .transport
                .fetch_history(conversation_id, before.clone(), BACKFILL_BATCH)
                .await?;
            let Some(first) = batch.first() else { break };
            if earliest.is_some_and(|seen| first.timestamp >= seen) {
                break;
            }
            earliest = Some(first.timestamp);
            before = Some(first.event_id.clone());

            let mut page: Vec<String> = batch.iter().map(ChatEvent::archive_line).collect();
            page.append(&mut lines);
            lines = page;
        }
        self.history.write_session(name, &lines).await?;
        Ok(lines.len())
    }

    /// Broadcast a farewell, tear down the transport, and signal shutdown.
    pub async fn quit(&self) {
        self.send_to_log(&["quitting".to_string()]).await;
        if let Err(error) = self.transport.disconnect().await {
            warn!(%error, "disconnect failed");
        }
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{event_at, rules_from_json, ScriptedTransport};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const RULES: &str = r#"{
        "users": {
            "ada": {"id": "u-ada", "admin": true, "reply_to": true},
            "bob": {"id": "u-bob", "reply_to": true},
            "eve": {"id": "u-eve"}
        },
        "conversations": {
            "lounge": {"id": "c-lounge", "reply_to": true, "load_history": true},
            "log": {"id": "c-log"}
        },
        "keywords": {"\\bmeep\\b": ["meep!"]},
        "notify_keyword": "magpie",
        "history_file": "HISTORY_FILE"
    }"#;

    fn bot_with(dir: &TempDir) -> (Arc<Bot>, Arc<ScriptedTransport>) {
        let history_file = dir.path().join("messages_lounge.txt");
        let json = RULES.replace("HISTORY_FILE", &history_file.display().to_string().replace('\\', "/"));
        let rules = rules_from_json(&json);
        let transport = Arc::new(ScriptedTransport::default());
        let bot = Bot::new(rules, transport.clone());
        (bot, transport)
    }

    #[tokio::test]
    async fn replies_go_to_the_origin_conversation() {
        let dir = TempDir::new().unwrap();
        let (bot, transport) = bot_with(&dir);
        bot.process_event(&event_at("u-bob", "Bob", "c-lounge", "meep meep", 0))
            .await;
        assert_eq!(transport.sent(), vec![("c-lounge".to_string(), "meep!".to_string())]);
    }

    #[tokio::test]
    async fn self_echoes_are_consumed_exactly_once() {
        let dir = TempDir::new().unwrap();
        let (bot, transport) = bot_with(&dir);
        bot.send_messages("lounge", &["meep!".to_string()]).await;
        assert_eq!(transport.sent().len(), 1);

        // the sent body comes back as an inbound event and is discarded
        bot.handle_event(event_at("u-self", "Magpie", "c-lounge", "meep!", 1))
            .await;
        assert_eq!(bot.recent_sent.lock().await.len(), 0);

        // the same text from a user later is handled normally
        bot.process_event(&event_at("u-bob", "Bob", "c-lounge", "meep!", 2))
            .await;
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn conversations_without_reply_to_are_ignored() {
        let dir = TempDir::new().unwrap();
        let (bot, transport) = bot_with(&dir);
        bot.handle_event(event_at("u-bob", "Bob", "c-elsewhere", "meep", 0))
            .await;
        // no handler task should have anything to send
        tokio::task::yield_now().await;
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn admin_commands_require_the_admin_flag() {
        let dir = TempDir::new().unwrap();
        let (bot, transport) = bot_with(&dir);
        bot.process_event(&event_at("u-eve", "Eve", "c-lounge", "ping", 0))
            .await;
        assert!(transport.sent().is_empty());

        bot.process_event(&event_at("u-ada", "Ada", "c-lounge", "ping", 1))
            .await;
        assert_eq!(transport.sent(), vec![("c-log".to_string(), "pinged".to_string())]);
    }

    #[tokio::test]
    async fn notify_keyword_forwards_to_the_log() {
        let dir = TempDir::new().unwrap();
        let (bot, transport) = bot_with(&dir);
        bot.process_event(&event_at("u-eve", "Eve Example", "c-lounge", "hey MAGPIE tell ada hi", 0))
            .await;
        assert_eq!(
            transport.sent(),
            vec![(
                "c-log".to_string(),
                "message from Eve Example: hey MAGPIE tell ada hi".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn deactivation_silences_the_reply_engine() {
        let dir = TempDir::new().unwrap();
        let (bot, transport) = bot_with(&dir);
        bot.process_event(&event_at("u-ada", "Ada", "c-lounge", "set active false", 0))
            .await;
        assert_eq!(transport.sent(), vec![("c-log".to_string(), "set".to_string())]);

        // a keyword-matching message from a reply_to user now goes
        // unanswered
        bot.process_event(&event_at("u-bob", "Bob", "c-lounge", "meep", 1))
            .await;
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn quit_says_goodbye_and_signals_shutdown() {
        let dir = TempDir::new().unwrap();
        let (bot, transport) = bot_with(&dir);
        let mut shutdown = bot.shutdown_signal();
        assert!(!*shutdown.borrow());
        bot.process_event(&event_at("u-ada", "Ada", "c-lounge", "quit", 0))
            .await;
        assert_eq!(transport.sent(), vec![("c-log".to_string(), "quitting".to_string())]);
        assert_eq!(transport.disconnects(), 1);
        shutdown.changed().await.unwrap();
        assert!(*shutdown.borrow());
    }

    #[tokio::test]
    async fn send_failures_abandon_the_remaining_messages() {
        let dir = TempDir::new().unwrap();
        let (bot, transport) = bot_with(&dir);
        transport.fail_next_send();
        bot.send_messages("lounge", &["one".to_string(), "two".to_string()])
            .await;
        assert!(transport.sent().is_empty());
        // nothing was recorded for echo suppression either
        assert_eq!(bot.recent_sent.lock().await.len(), 0);
    }

    #[tokio::test]
    async fn echo_buffer_stays_bounded() {
        let dir = TempDir::new().unwrap();
        let (bot, _transport) = bot_with(&dir);
        let messages: Vec<String> = (0..200).map(|i| format!("m{i}")).collect();
        bot.send_messages("lounge", &messages).await;
        assert_eq!(bot.recent_sent.lock().await.len(), ECHO_BUFFER_CAPACITY);
    }

    #[tokio::test]
    async fn backfill_stops_on_timestamp_regression() {
        let dir = TempDir::new().unwrap();
        let (bot, transport) = bot_with(&dir);
        // newest page first; the transport wraps around after the oldest
        // page instead of returning nothing
        transport.push_history_page(vec![
            event_at("u-bob", "Bob Builder", "c-lounge", "newer one", 100),
            event_at("u-bob", "Bob Builder", "c-lounge", "newer two", 110),
        ]);
        transport.push_history_page(vec![
            event_at("u-ada", "Ada Lovelace", "c-lounge", "older one", 10),
            event_at("u-ada", "Ada Lovelace", "c-lounge", "older two", 20),
        ]);
        transport.push_history_page(vec![
            event_at("u-bob", "Bob Builder", "c-lounge", "newer one", 100),
            event_at("u-bob", "Bob Builder", "c-lounge", "newer two", 110),
        ]);

        let count = bot.backfill_conversation("lounge", "c-lounge").await.unwrap();
        assert_eq!(count, 4);

        let lines = bot.history().read_window(Some(0), 4).await.unwrap();
        let bodies: Vec<&str> = lines
            .iter()
            .map(|line| line.rsplit(" :: ").next().unwrap())
            .collect();
        assert_eq!(bodies, vec!["older one", "older two", "newer one", "newer two"]);
        // the oldest page's first event became the paging cursor twice
        assert!(transport.history_requests() >= 3);
    }

    #[tokio::test]
    async fn backfill_network_errors_are_contained() {
        let dir = TempDir::new().unwrap();
        let (bot, transport) = bot_with(&dir);
        transport.fail_next_history();
        let error = bot
            .backfill_conversation("lounge", "c-lounge")
            .await
            .unwrap_err();
        assert!(error.is_network());
    }
}
