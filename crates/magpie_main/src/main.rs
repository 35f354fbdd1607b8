//! magpie binary: load the rule file, connect the Discord transport, run.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use miette::{miette, Result};
use tracing_subscriber::EnvFilter;

use magpie_core::{Bot, BotConfig};
use magpie_discord::{run_discord, DiscordTransport};

#[derive(Debug, Parser)]
#[command(name = "magpie", version, about = "Auto-reply agent for group chat")]
struct Args {
    /// Path to the JSON rule file
    #[arg(short, long, default_value = "reply_data.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let rules = BotConfig::load(&args.config)?;
    let token = std::env::var("DISCORD_TOKEN")
        .map_err(|_| miette!("No Discord configuration found. Set DISCORD_TOKEN."))?;

    let transport = Arc::new(DiscordTransport::new(&token));
    let bot = Bot::new(rules, transport.clone());

    tracing::info!("magpie starting");
    run_discord(bot, transport, &token).await?;
    tracing::info!("magpie stopped");
    Ok(())
}
