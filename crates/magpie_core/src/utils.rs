//! Assorted pure text helpers shared by the command router, the reply
//! engine, and the archive.

use chrono::{DateTime, Utc};

/// Field separator for archive lines. Chosen because it is very uncommon
/// in normal message text; search refuses lines where it appears 4+ times.
pub const SEPARATOR: &str = "::";

/// Lowercase and whitespace-normalize user input into a single string.
pub fn clean(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase and split user input into tokens.
pub fn clean_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Clamp `value` into `[min_value, max_value]`.
///
/// When the bounds are inverted the lower bound wins, matching the
/// `max(min, min(value, max))` evaluation order the rest of the crate
/// relies on for degenerate windows.
pub fn clamp(value: isize, min_value: isize, max_value: isize) -> isize {
    min_value.max(value.min(max_value))
}

/// Whether `text` counts as shouting: it contains at least one cased
/// character and none of them are lowercase.
pub fn is_shouting(text: &str) -> bool {
    let mut has_cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}

/// First whitespace-delimited word of a display name.
pub fn first_name(display_name: &str) -> &str {
    display_name.split_whitespace().next().unwrap_or("")
}

/// Archive timestamp format, e.g. `Nov 14, 2023 10:13 PM`.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%b %d, %Y %I:%M %p").to_string()
}

/// Serialize one archive line: `name :: timestamp :: body`.
pub fn format_history_line(name: &str, timestamp: DateTime<Utc>, body: &str) -> String {
    format!("{name} {SEPARATOR} {} {SEPARATOR} {body}", format_timestamp(timestamp))
}

/// Layout for [`describe`] output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeMode {
    /// `name: a, b`
    Short,
    /// `Name:` followed by tab-indented parts, one per line.
    Long,
}

/// Format a named list of parts in the given mode.
pub fn describe(name: &str, parts: &[String], mode: DescribeMode) -> String {
    match mode {
        DescribeMode::Short => format!("{name}: {}", parts.join(", ")),
        DescribeMode::Long => {
            let mut title: Vec<char> = name.chars().collect();
            if let Some(first) = title.first_mut() {
                *first = first.to_ascii_uppercase();
            }
            let title: String = title.into_iter().collect();
            let mut out = format!("{title}:");
            for part in parts {
                out.push_str("\n\t");
                out.push_str(part);
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clean_normalizes_case_and_whitespace() {
        assert_eq!(clean("  Hello   World "), "hello world");
        assert_eq!(clean(""), "");
        assert_eq!(clean_tokens("More  10"), vec!["more", "10"]);
    }

    #[test]
    fn clamp_matches_bounds() {
        assert_eq!(clamp(5, 0, 10), 5);
        assert_eq!(clamp(-3, 0, 10), 0);
        assert_eq!(clamp(42, 0, 10), 10);
        // inverted bounds: lower bound wins
        assert_eq!(clamp(7, 10, 3), 10);
    }

    #[test]
    fn shouting_requires_cased_uppercase() {
        assert!(is_shouting("HI THERE"));
        assert!(is_shouting("HI 123!"));
        assert!(!is_shouting("Hi there"));
        assert!(!is_shouting("123 !?"));
        assert!(!is_shouting(""));
    }

    #[test]
    fn describe_modes() {
        let parts = vec!["a".to_string(), "b".to_string()];
        assert_eq!(describe("name", &parts, DescribeMode::Short), "name: a, b");
        assert_eq!(describe("name", &parts, DescribeMode::Long), "Name:\n\ta\n\tb");
    }

    #[test]
    fn history_line_format() {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(
            format_history_line("Ada", ts, "hello"),
            "Ada :: Nov 14, 2023 10:13 PM :: hello"
        );
    }
}
