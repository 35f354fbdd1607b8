//! Error types for the Discord integration.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for Discord operations.
pub type Result<T> = std::result::Result<T, DiscordError>;

#[derive(Debug, Error, Diagnostic)]
pub enum DiscordError {
    /// Gateway or HTTP error from serenity
    #[error("Discord client error: {0}")]
    #[diagnostic(
        code(magpie_discord::client_error),
        help("Check the bot token and gateway intents")
    )]
    Client(#[from] serenity::Error),

    /// Error bubbled up from the core runtime
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] magpie_core::CoreError),
}
