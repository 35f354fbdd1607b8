//! Rule file loading and compilation.
//!
//! The rule file is a single JSON document loaded once at startup and
//! compiled into an immutable [`ReplyRules`]: regexes are precompiled,
//! reply-group shapes are validated, and the order of the `keywords` and
//! `reply_groups` tables is preserved because matching is first-wins.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use rand::seq::IndexedRandom;
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::{ConfigError, CoreError, Result};

/// Name of the conversation used for operator/diagnostic traffic.
pub const LOG_CONVERSATION: &str = "log";

/// Per-user flags from the rule file.
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub id: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub reply_to: bool,
}

/// Per-conversation flags from the rule file.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    pub id: String,
    /// Whether inbound events from this conversation are handled at all.
    #[serde(default)]
    pub reply_to: bool,
    /// Whether this conversation's history is backfilled at startup.
    #[serde(default)]
    pub load_history: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    /// The pool is a flat list; one entry is returned.
    Single,
    /// The pool is a list of reply sets; one whole set is returned.
    Group,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawReplies {
    Flat(Vec<String>),
    Sets(Vec<Vec<String>>),
}

#[derive(Debug, Clone, Deserialize)]
struct RawReplyGroup {
    #[serde(rename = "type")]
    kind: GroupKind,
    replies: RawReplies,
    chance: u32,
    #[serde(default)]
    keyword: Option<String>,
}

/// Raw shape of the JSON rule file.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    users: HashMap<String, UserConfig>,
    #[serde(default)]
    conversations: HashMap<String, ConversationConfig>,
    #[serde(default, deserialize_with = "ordered_map")]
    keywords: Vec<(String, Vec<String>)>,
    #[serde(default, deserialize_with = "ordered_map")]
    reply_groups: Vec<(String, RawReplyGroup)>,
    #[serde(default)]
    notify_keyword: String,
    history_file: PathBuf,
}

/// Deserialize a JSON object into a vector of entries, keeping the
/// document order of the keys instead of collecting into a hash map.
fn ordered_map<'de, D, V>(deserializer: D) -> std::result::Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct OrderedMapVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a JSON object")
        }

        fn visit_map<A: MapAccess<'de>>(
            self,
            mut map: A,
        ) -> std::result::Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, V>()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
}

/// One compiled keyword rule: first matching pattern wins.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub pattern: Regex,
    pub replies: Vec<String>,
}

/// Compiled reply pool of a group.
#[derive(Debug, Clone)]
pub enum GroupReplies {
    Single(Vec<String>),
    Sets(Vec<Vec<String>>),
}

/// A named bundle of candidate responses with an activation chance and an
/// optional forcing trigger.
#[derive(Debug, Clone)]
pub struct ReplyGroup {
    pub name: String,
    /// Activation probability in percent, 0-100.
    pub chance: u32,
    /// When present and matching, the group fires unconditionally.
    pub trigger: Option<Regex>,
    pub replies: GroupReplies,
}

impl ReplyGroup {
    /// Draw a reply payload from this group's pool.
    pub fn pick(&self) -> Vec<String> {
        let mut rng = rand::rng();
        match &self.replies {
            GroupReplies::Single(pool) => pool.choose(&mut rng).into_iter().cloned().collect(),
            GroupReplies::Sets(pool) => pool.choose(&mut rng).cloned().unwrap_or_default(),
        }
    }
}

/// Compiled, immutable rule set for the process lifetime.
#[derive(Debug, Clone)]
pub struct ReplyRules {
    pub users: HashMap<String, UserConfig>,
    pub conversations: HashMap<String, ConversationConfig>,
    pub keywords: Vec<KeywordRule>,
    pub reply_groups: Vec<ReplyGroup>,
    pub notify_keyword: String,
    pub history_file: PathBuf,
}

impl BotConfig {
    /// Load and compile the rule file at `path`.
    pub fn load(path: &Path) -> Result<ReplyRules> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoreError::configuration(display.as_str(), ConfigError::Io(e.to_string())))?;
        let config: BotConfig = serde_json::from_str(&text)
            .map_err(|e| {
                CoreError::configuration(display.as_str(), ConfigError::JsonParse(e.to_string()))
            })?;
        config
            .compile()
            .map_err(|e| CoreError::configuration(display, e))
    }

    /// Parse a rule document from a JSON string.
    pub fn from_json(text: &str) -> std::result::Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::JsonParse(e.to_string()))
    }

    /// Compile raw configuration into [`ReplyRules`].
    pub fn compile(self) -> std::result::Result<ReplyRules, ConfigError> {
        let mut keywords = Vec::with_capacity(self.keywords.len());
        for (pattern, replies) in self.keywords {
            keywords.push(KeywordRule {
                pattern: compile_regex(&pattern)?,
                replies,
            });
        }

        let mut reply_groups = Vec::with_capacity(self.reply_groups.len());
        for (name, raw) in self.reply_groups {
            if raw.chance > 100 {
                return Err(ConfigError::InvalidValue {
                    field: format!("reply_groups.{name}.chance"),
                    reason: "must be between 0 and 100".to_string(),
                });
            }
            let replies = match (raw.kind, raw.replies) {
                (GroupKind::Single, RawReplies::Flat(pool)) => GroupReplies::Single(pool),
                (GroupKind::Group, RawReplies::Sets(pool)) => GroupReplies::Sets(pool),
                (GroupKind::Single, RawReplies::Sets(_)) => {
                    return Err(ConfigError::InvalidValue {
                        field: format!("reply_groups.{name}.replies"),
                        reason: "single groups take a flat list of replies".to_string(),
                    });
                }
                (GroupKind::Group, RawReplies::Flat(pool)) if pool.is_empty() => {
                    // an empty pool is ambiguous between the two shapes
                    GroupReplies::Sets(Vec::new())
                }
                (GroupKind::Group, RawReplies::Flat(_)) => {
                    return Err(ConfigError::InvalidValue {
                        field: format!("reply_groups.{name}.replies"),
                        reason: "group groups take a list of reply sets".to_string(),
                    });
                }
            };
            let trigger = match raw.keyword {
                Some(pattern) => Some(compile_regex(&pattern)?),
                None => None,
            };
            reply_groups.push(ReplyGroup {
                name,
                chance: raw.chance,
                trigger,
                replies,
            });
        }

        Ok(ReplyRules {
            users: self.users,
            conversations: self.conversations,
            keywords,
            reply_groups,
            notify_keyword: self.notify_keyword,
            history_file: self.history_file,
        })
    }
}

fn compile_regex(pattern: &str) -> std::result::Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

impl ReplyRules {
    /// Look up a user entry by transport id.
    pub fn user_by_id(&self, user_id: &str) -> Option<&UserConfig> {
        self.users.values().find(|user| user.id == user_id)
    }

    pub fn user_is_admin(&self, user_id: &str) -> bool {
        self.user_by_id(user_id).map(|u| u.admin).unwrap_or(false)
    }

    pub fn user_reply_to(&self, user_id: &str) -> bool {
        self.user_by_id(user_id).map(|u| u.reply_to).unwrap_or(false)
    }

    /// Look up a conversation entry by transport id.
    pub fn conversation_by_id(&self, conversation_id: &str) -> Option<&ConversationConfig> {
        self.conversations
            .values()
            .find(|conversation| conversation.id == conversation_id)
    }

    pub fn conversation_reply_to(&self, conversation_id: &str) -> bool {
        self.conversation_by_id(conversation_id)
            .map(|c| c.reply_to)
            .unwrap_or(false)
    }

    /// Resolve a human-friendly conversation name to its transport id.
    /// Unknown names are passed through untouched so callers can address
    /// conversations directly by id.
    pub fn resolve_conversation(&self, name_or_id: &str) -> String {
        self.conversations
            .get(name_or_id)
            .map(|conversation| conversation.id.clone())
            .unwrap_or_else(|| name_or_id.to_string())
    }

    /// Conversations whose history should be backfilled at startup.
    pub fn load_history_conversations(
        &self,
    ) -> impl Iterator<Item = (&String, &ConversationConfig)> {
        self.conversations
            .iter()
            .filter(|(_, conversation)| conversation.load_history)
    }
}
