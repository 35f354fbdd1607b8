//! Message classification and reply selection.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::config::ReplyRules;
use crate::error::Result;
use crate::history::{HistoryStore, DEFAULT_WINDOW_SIZE};
use crate::status::StatusMap;
use crate::utils;

/// Classifies inbound message text against the configured rules and
/// produces reply lines.
///
/// Pure apart from the random draws and the one history read used for the
/// quote fallback.
#[derive(Debug, Clone)]
pub struct ReplyEngine {
    rules: Arc<ReplyRules>,
}

impl ReplyEngine {
    pub fn new(rules: Arc<ReplyRules>) -> Self {
        Self { rules }
    }

    /// Run the full reply-selection pipeline for one message body.
    ///
    /// Keyword rules are checked first in configuration order and the
    /// first match wins. Otherwise reply groups are tried in order: a
    /// matching trigger keyword forces a group; without one the group
    /// fires on a percent draw, gated by its status toggle. If nothing
    /// fired, a random history window is occasionally quoted back. An
    /// all-caps input uppercases every produced line.
    pub async fn classify_and_reply(
        &self,
        body: &str,
        status: &StatusMap,
        history: &HistoryStore,
    ) -> Result<Vec<String>> {
        let text = utils::clean(body);
        let mut replies: Vec<String> = Vec::new();

        for rule in &self.rules.keywords {
            if rule.pattern.is_match(&text) {
                if let Some(reply) = rule.replies.choose(&mut rand::rng()) {
                    replies.push(reply.clone());
                }
                break;
            }
        }

        if replies.is_empty() {
            for group in &self.rules.reply_groups {
                let forced = group
                    .trigger
                    .as_ref()
                    .is_some_and(|trigger| trigger.is_match(&text));
                let drawn = !forced
                    && rand::rng().random_range(0..=100u32) <= group.chance
                    && status.is_enabled(&group.name);
                if forced || drawn {
                    replies.extend(group.pick());
                    break;
                }
            }
        }

        if replies.is_empty()
            && status.history_enabled()
            && rand::rng().random_range(1..=10) < 3
        {
            replies = history.read_window(None, DEFAULT_WINDOW_SIZE).await?;
        }

        if utils::is_shouting(body) {
            for reply in &mut replies {
                *reply = reply.to_uppercase();
            }
        }
        Ok(replies)
    }
}
