//! Command pattern matching for `on_command` rules.
//!
//! Three forms are recognised, all compared case-insensitively against
//! whitespace-normalised input:
//!
//! - exact literal: `press button`
//! - prefix: `pull *` (single trailing `*`)
//! - glob: `*lever*`, `say * to *` (`*` = any run of characters, possibly empty)

use core::fmt;

/// Lowercase and collapse runs of whitespace to single spaces.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A compiled command pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPattern {
    /// Whole input must equal the literal.
    Exact(String),
    /// Input must start with the literal.
    Prefix(String),
    /// Literal segments separated by `*` wildcards.
    Glob(Vec<String>),
}

impl CommandPattern {
    /// Compile a pattern string.
    pub fn parse(pattern: &str) -> Self {
        let normalized = normalize(pattern);
        let stars = normalized.matches('*').count();
        if stars == 0 {
            return Self::Exact(normalized);
        }
        if stars == 1
            && let Some(prefix) = normalized.strip_suffix('*')
        {
            return Self::Prefix(prefix.to_owned());
        }
        Self::Glob(normalized.split('*').map(str::to_owned).collect())
    }

    /// Whether raw command text matches.
    pub fn matches(&self, input: &str) -> bool {
        let input = normalize(input);
        match self {
            Self::Exact(literal) => input == *literal,
            Self::Prefix(prefix) => input.starts_with(prefix.as_str()),
            Self::Glob(segments) => glob_match(segments, &input).unwrap_or(false),
        }
    }
}

impl fmt::Display for CommandPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(literal) => f.write_str(literal),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
            Self::Glob(segments) => f.write_str(&segments.join("*")),
        }
    }
}

/// Leftmost-first segment matching. With `*` as the only metacharacter,
/// taking the earliest occurrence of each middle segment never rules out a
/// match that a later occurrence would allow.
fn glob_match(segments: &[String], input: &str) -> Option<bool> {
    let (first, rest) = segments.split_first()?;
    let Some(mut remaining) = input.strip_prefix(first.as_str()) else {
        return Some(false);
    };
    let Some((last, middle)) = rest.split_last() else {
        return Some(remaining.is_empty());
    };
    for segment in middle {
        let Some(at) = remaining.find(segment.as_str()) else {
            return Some(false);
        };
        remaining = remaining.get(at..)?.strip_prefix(segment.as_str())?;
    }
    Some(remaining.ends_with(last.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_pattern_matches_any_object() {
        let pattern = CommandPattern::parse("pull *");
        assert!(matches!(pattern, CommandPattern::Prefix(_)));
        assert!(pattern.matches("pull lever"));
        assert!(pattern.matches("pull rope"));
        assert!(!pattern.matches("push lever"));
        assert!(!pattern.matches("pull"));
    }

    #[test]
    fn exact_pattern_is_case_insensitive() {
        let pattern = CommandPattern::parse("press button");
        assert!(pattern.matches("press button"));
        assert!(pattern.matches("PRESS   Button"));
        assert!(!pattern.matches("press button now"));
        assert!(!pattern.matches("press"));
    }

    #[test]
    fn glob_pattern_matches_substrings() {
        let pattern = CommandPattern::parse("*lever*");
        assert!(pattern.matches("pull lever"));
        assert!(pattern.matches("lever"));
        assert!(pattern.matches("yank the lever hard"));
        assert!(!pattern.matches("pull rope"));
    }

    #[test]
    fn glob_segments_must_appear_in_order() {
        let pattern = CommandPattern::parse("say * to *");
        assert!(pattern.matches("say hello to the guard"));
        assert!(!pattern.matches("say hello"));
        assert!(!pattern.matches("to guard say hello"));
        let suffix = CommandPattern::parse("*door");
        assert!(suffix.matches("open door"));
        assert!(!suffix.matches("door open"));
    }

    #[test]
    fn lone_star_matches_everything() {
        let pattern = CommandPattern::parse("*");
        assert!(pattern.matches("anything at all"));
        assert!(pattern.matches(""));
    }
}
