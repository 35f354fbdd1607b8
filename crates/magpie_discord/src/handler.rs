//! Gateway event handling and client lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serenity::async_trait;
use serenity::client::{Client, Context, EventHandler};
use serenity::model::channel::Message;
use serenity::model::gateway::{GatewayIntents, Ready};
use tracing::info;

use magpie_core::Bot;

use crate::error::Result;
use crate::transport::{chat_event_from_message, DiscordTransport};

/// Forwards gateway events into the bot runtime.
///
/// Every inbound message is forwarded, including the bot's own sends
/// coming back from the gateway; the runtime's echo buffer consumes
/// those.
pub struct MagpieEventHandler {
    bot: Arc<Bot>,
    backfill_started: AtomicBool,
}

impl MagpieEventHandler {
    pub fn new(bot: Arc<Bot>) -> Self {
        Self {
            bot,
            backfill_started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EventHandler for MagpieEventHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, "connected");
        // ready fires again on reconnects; backfill only once
        if !self.backfill_started.swap(true, Ordering::SeqCst) {
            self.bot.spawn_history_backfill();
        }
    }

    async fn message(&self, _ctx: Context, message: Message) {
        self.bot.handle_event(chat_event_from_message(message)).await;
    }
}

/// Build the Discord client and run it until it stops or the bot
/// requests shutdown.
pub async fn run_discord(
    bot: Arc<Bot>,
    transport: Arc<DiscordTransport>,
    token: &str,
) -> Result<()> {
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = MagpieEventHandler::new(bot.clone());
    let mut client = Client::builder(token, intents).event_handler(handler).await?;
    transport.attach_shards(client.shard_manager.clone());

    let mut shutdown = bot.shutdown_signal();
    tokio::select! {
        result = client.start() => {
            result?;
            info!("discord client stopped");
        }
        _ = shutdown.changed() => {
            info!("shutdown requested");
        }
    }
    Ok(())
}
