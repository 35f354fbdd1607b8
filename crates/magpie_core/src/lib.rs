//! Magpie Core - Auto-Reply Engine and Message Archive
//!
//! This crate provides the transport-agnostic heart of magpie: the rule
//! file model, the reply classification engine, the line-oriented history
//! archive with windowed reads and incremental search, the text command
//! router, and the bot runtime that ties them to a [`ChatTransport`].

pub mod bot;
pub mod command;
pub mod config;
pub mod error;
pub mod history;
pub mod message;
pub mod reply;
pub mod status;
pub mod transport;
pub mod utils;

#[cfg(test)]
pub mod test_helpers;

pub use bot::Bot;
pub use config::{BotConfig, ReplyRules};
pub use error::{ConfigError, CoreError, Result};
pub use history::{HistoryStore, HistoryWindow, SearchOutcome};
pub use message::ChatEvent;
pub use reply::ReplyEngine;
pub use status::{StatusMap, StatusValue};
pub use transport::ChatTransport;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        Bot, BotConfig, ChatEvent, ChatTransport, CoreError, HistoryStore, HistoryWindow,
        ReplyEngine, ReplyRules, Result, StatusMap, StatusValue,
    };
}
