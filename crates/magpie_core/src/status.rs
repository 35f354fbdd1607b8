//! Runtime-mutable status and configuration map.
//!
//! Seeded once from the compiled rules, then read by the reply engine and
//! mutated only through the privileged `set` command. Values are either
//! booleans (feature toggles, one per reply group) or integers (search
//! cursor and result cap); the kind of each key is fixed at seeding time
//! and checked on every write.

use std::fmt;

use thiserror::Error;

use crate::config::ReplyRules;
use crate::utils::{describe, DescribeMode};

pub const ACTIVE: &str = "active";
pub const HISTORY: &str = "history";
pub const GREP_START: &str = "grep_start";
pub const MAX_GREP: &str = "max_grep";

/// Default cap on returned search results.
const DEFAULT_MAX_GREP: usize = 20;

/// A status value: boolean toggle or integer setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusValue {
    Bool(bool),
    Int(usize),
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusValue::Bool(value) => write!(f, "{value}"),
            StatusValue::Int(value) => write!(f, "{value}"),
        }
    }
}

/// User-visible rejection of a `set` request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("invalid status to set {0}")]
    UnknownProperty(String),
    #[error("invalid value")]
    InvalidValue,
}

/// Insertion-ordered property map.
#[derive(Debug, Clone)]
pub struct StatusMap {
    entries: Vec<(String, StatusValue)>,
}

impl StatusMap {
    /// Seed the map for a rule set: fixed engine flags first, then one
    /// enabled toggle per reply group, in configuration order.
    pub fn for_rules(rules: &ReplyRules) -> Self {
        let mut entries = vec![
            (ACTIVE.to_string(), StatusValue::Bool(true)),
            (HISTORY.to_string(), StatusValue::Bool(true)),
            (GREP_START.to_string(), StatusValue::Int(0)),
            (MAX_GREP.to_string(), StatusValue::Int(DEFAULT_MAX_GREP)),
        ];
        for group in &rules.reply_groups {
            entries.push((group.name.clone(), StatusValue::Bool(true)));
        }
        Self { entries }
    }

    pub fn get(&self, property: &str) -> Option<StatusValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| *value)
    }

    /// Whether a boolean property is present and enabled.
    pub fn is_enabled(&self, property: &str) -> bool {
        matches!(self.get(property), Some(StatusValue::Bool(true)))
    }

    /// Integer property value, 0 when absent or of the wrong kind.
    pub fn int(&self, property: &str) -> usize {
        match self.get(property) {
            Some(StatusValue::Int(value)) => value,
            _ => 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_enabled(ACTIVE)
    }

    pub fn history_enabled(&self) -> bool {
        self.is_enabled(HISTORY)
    }

    pub fn grep_start(&self) -> usize {
        self.int(GREP_START)
    }

    pub fn max_grep(&self) -> usize {
        self.int(MAX_GREP)
    }

    /// Coerce and assign a property from text input.
    ///
    /// Booleans accept anything starting with `t` as true and everything
    /// else as false; integers accept digit-only strings.
    pub fn set(&mut self, property: &str, value: &str) -> Result<(), StatusError> {
        let slot = self
            .entries
            .iter_mut()
            .find(|(name, _)| name == property)
            .ok_or_else(|| StatusError::UnknownProperty(property.to_string()))?;
        match slot.1 {
            StatusValue::Bool(_) => {
                slot.1 = StatusValue::Bool(value.starts_with('t'));
                Ok(())
            }
            StatusValue::Int(_) => {
                if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
                    return Err(StatusError::InvalidValue);
                }
                let parsed = value.parse().map_err(|_| StatusError::InvalidValue)?;
                slot.1 = StatusValue::Int(parsed);
                Ok(())
            }
        }
    }

    /// Short-form dump, one `name: value` line per entry.
    pub fn report(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(name, value)| describe(name, &[value.to_string()], DescribeMode::Short))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, StatusValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
    }
}
