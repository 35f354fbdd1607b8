//! Command parsing and dispatch.
//!
//! The first token of a message selects a command; the rest of the token
//! stream is consumed through an explicit [`TokenCursor`]. Unrecognized
//! text is simply not a command. Malformed arguments never error: the
//! command falls back to its default behavior instead.

use parking_lot::Mutex;

use crate::error::Result;
use crate::history::{HistoryStore, SearchOutcome, DEFAULT_WINDOW_SIZE};
use crate::reply::ReplyEngine;
use crate::status::StatusMap;
use crate::utils;

/// Cursor over the cleaned tokens of one message.
#[derive(Debug, Clone)]
pub struct TokenCursor {
    raw: String,
    tokens: Vec<String>,
    index: usize,
}

impl TokenCursor {
    pub fn new(text: &str) -> Self {
        Self {
            raw: text.to_string(),
            tokens: utils::clean_tokens(text),
            index: 0,
        }
    }

    /// Consume and return the next token, or an empty string past the end.
    pub fn next_token(&mut self) -> String {
        let token = self.tokens.get(self.index).cloned().unwrap_or_default();
        self.index = (self.index + 1).min(self.tokens.len());
        token
    }

    /// All not-yet-consumed tokens rejoined with single spaces.
    pub fn remaining(&self) -> String {
        self.tokens[self.index..].join(" ")
    }

    /// The full token list.
    pub fn all(&self) -> &[String] {
        &self.tokens
    }

    /// The original untouched text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Move the cursor by `offset` (clamped to the token list) and return
    /// the token now under it without consuming further.
    pub fn advance_by(&mut self, offset: isize) -> String {
        let index = utils::clamp(
            self.index as isize + offset,
            0,
            self.tokens.len() as isize,
        );
        self.index = index as usize;
        self.tokens.get(self.index).cloned().unwrap_or_default()
    }
}

/// Outcome of a privileged command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAction {
    /// Messages for the operator log conversation.
    Replies(Vec<String>),
    /// Shut the bot down.
    Quit,
}

/// Run the public history commands against one message.
///
/// Returns `None` when the message is not a command.
pub async fn run_public(
    text: &str,
    history: &HistoryStore,
    status: &Mutex<StatusMap>,
) -> Result<Option<Vec<String>>> {
    let mut cursor = TokenCursor::new(text);
    match cursor.next_token().as_str() {
        "context" => Ok(Some(history.read_context().await?)),
        "more" => Ok(Some(history.read_more().await?)),
        "history" => {
            let start = cursor.next_token().parse::<usize>().ok();
            Ok(Some(history.read_window(start, DEFAULT_WINDOW_SIZE).await?))
        }
        "grep" => {
            let query = grep_query(cursor.raw());
            let (from, max_results) = {
                let status = status.lock();
                (status.grep_start(), status.max_grep())
            };
            let outcome = history.search(&query, from, max_results).await?;
            Ok(Some(format_grep(&query, outcome)))
        }
        _ => Ok(None),
    }
}

/// Run the privileged commands against one message. The caller is
/// responsible for checking that the sender is an admin.
pub async fn run_admin(
    text: &str,
    engine: &ReplyEngine,
    history: &HistoryStore,
    status: &Mutex<StatusMap>,
) -> Result<Option<AdminAction>> {
    let mut cursor = TokenCursor::new(text);
    let action = match cursor.next_token().as_str() {
        "ping" => AdminAction::Replies(vec!["pinged".to_string()]),
        "status" => {
            let mut lines = status.lock().report();
            lines.push(format!("last_history: {}", history.last_window()));
            AdminAction::Replies(vec![lines.join("\n")])
        }
        "reply" => {
            let snapshot = status.lock().clone();
            let replies = engine
                .classify_and_reply(&cursor.remaining(), &snapshot, history)
                .await?;
            AdminAction::Replies(replies)
        }
        "set" => {
            let property = cursor.next_token();
            let value = cursor.next_token();
            let message = match status.lock().set(&property, &value) {
                Ok(()) => "set".to_string(),
                Err(error) => error.to_string(),
            };
            AdminAction::Replies(vec![message])
        }
        "quit" => AdminAction::Quit,
        _ => return Ok(None),
    };
    Ok(Some(action))
}

/// Everything after the command word, verbatim.
fn grep_query(raw: &str) -> String {
    match raw.trim_start().split_once(char::is_whitespace) {
        Some((_, rest)) => rest.to_string(),
        None => String::new(),
    }
}

fn format_grep(query: &str, outcome: SearchOutcome) -> Vec<String> {
    let returned = outcome.matches.len();
    let mut messages = Vec::with_capacity(returned + 2);
    messages.push(format!("{} matches found for {query}", outcome.total));
    messages.extend(outcome.matches);
    messages.push(format!(
        "done sending {returned}/{} results for {query}",
        outcome.total
    ));
    messages
}
