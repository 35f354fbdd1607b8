//! Magpie Discord - Discord transport integration
//!
//! This crate connects the transport-agnostic magpie runtime to Discord:
//! a [`DiscordTransport`] implements the core `ChatTransport` over the
//! REST API, and [`MagpieEventHandler`] feeds gateway messages into the
//! bot. Conversation ids in the rule file are Discord channel ids.
//!
//! The bot token is provided by the caller; there are no environment
//! variable reads in this crate.

pub mod error;
pub mod handler;
pub mod transport;

pub use error::{DiscordError, Result};
pub use handler::{run_discord, MagpieEventHandler};
pub use transport::DiscordTransport;

// Re-export serenity for convenience
pub use serenity;
