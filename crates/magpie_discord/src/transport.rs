//! `ChatTransport` implementation over the Discord REST API.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::gateway::ShardManager;
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::id::{ChannelId, MessageId};

use magpie_core::{ChatEvent, ChatTransport, CoreError};

/// Discord's cap on messages per history request.
const MAX_PAGE: usize = 100;

/// REST-side transport. Gateway lifetime is owned by the client in
/// [`run_discord`](crate::run_discord); the shard manager is attached
/// once the client exists so `disconnect` can stop it.
pub struct DiscordTransport {
    http: Arc<Http>,
    shards: OnceLock<Arc<ShardManager>>,
}

impl DiscordTransport {
    pub fn new(token: &str) -> Self {
        Self {
            http: Arc::new(Http::new(token)),
            shards: OnceLock::new(),
        }
    }

    pub(crate) fn attach_shards(&self, manager: Arc<ShardManager>) {
        let _ = self.shards.set(manager);
    }
}

/// Parse a rule-file conversation id into a Discord channel id.
pub(crate) fn parse_channel_id(conversation_id: &str) -> magpie_core::Result<ChannelId> {
    conversation_id
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(ChannelId::new)
        .ok_or_else(|| CoreError::InvalidConversation {
            id: conversation_id.to_string(),
        })
}

/// Convert a gateway message into the core event model.
pub(crate) fn chat_event_from_message(message: Message) -> ChatEvent {
    let sender_name = message
        .author
        .global_name
        .clone()
        .unwrap_or_else(|| message.author.name.clone());
    let timestamp =
        DateTime::<Utc>::from_timestamp(message.timestamp.unix_timestamp(), 0).unwrap_or_default();
    ChatEvent {
        event_id: message.id.get().to_string(),
        conversation_id: message.channel_id.get().to_string(),
        sender_id: message.author.id.get().to_string(),
        sender_name,
        timestamp,
        body: message.content,
    }
}

#[async_trait]
impl ChatTransport for DiscordTransport {
    async fn send_message(&self, conversation_id: &str, body: &str) -> magpie_core::Result<()> {
        let channel = parse_channel_id(conversation_id)?;
        channel
            .say(&self.http, body)
            .await
            .map_err(|e| CoreError::network("send", e.to_string()))?;
        Ok(())
    }

    async fn fetch_history(
        &self,
        conversation_id: &str,
        before: Option<String>,
        limit: usize,
    ) -> magpie_core::Result<Vec<ChatEvent>> {
        let channel = parse_channel_id(conversation_id)?;
        let mut request = serenity::builder::GetMessages::new().limit(limit.min(MAX_PAGE) as u8);
        if let Some(before) = before {
            let id = before
                .parse::<u64>()
                .ok()
                .filter(|id| *id != 0)
                .ok_or_else(|| CoreError::InvalidConversation { id: before.clone() })?;
            request = request.before(MessageId::new(id));
        }
        let messages = channel
            .messages(&self.http, request)
            .await
            .map_err(|e| CoreError::network("history", e.to_string()))?;
        // the API returns newest first; the archive wants chronological order
        Ok(messages
            .into_iter()
            .rev()
            .map(chat_event_from_message)
            .collect())
    }

    async fn disconnect(&self) -> magpie_core::Result<()> {
        if let Some(manager) = self.shards.get() {
            manager.shutdown_all().await;
        }
        Ok(())
    }
}
