//! Inbound chat event model.

use chrono::{DateTime, Utc};

use crate::utils;

/// A single chat message as delivered by the transport.
///
/// Events are transient: the runtime consumes each one once and keeps no
/// reference to it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Transport-level event identifier, used as a paging cursor.
    pub event_id: String,
    /// Identifier of the conversation the message arrived in.
    pub conversation_id: String,
    /// Transport-level identifier of the sender.
    pub sender_id: String,
    /// Display name of the sender.
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
    pub body: String,
}

impl ChatEvent {
    /// First whitespace-delimited word of the sender's display name.
    pub fn sender_first_name(&self) -> &str {
        utils::first_name(&self.sender_name)
    }

    /// Serialize this event as one archive line.
    pub fn archive_line(&self) -> String {
        utils::format_history_line(self.sender_first_name(), self.timestamp, &self.body)
    }
}
