//! Fail-closed content filter for generated replies.
//!
//! Rules are case-insensitive regexes over the candidate text. A match in
//! any category blocks the reply; no match means safe. The filter holds no
//! mutable state, so the same text always gets the same verdict.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Why a reply was blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    SexualContent,
    Harassment,
    SelfHarm,
    /// Matched an operator-configured blocklist term.
    Blocklist,
    /// Longer than the configured maximum response length.
    TooLong,
}

impl fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SexualContent => "sexual content",
            Self::Harassment => "harassment",
            Self::SelfHarm => "self-harm encouragement",
            Self::Blocklist => "blocklisted term",
            Self::TooLong => "exceeds maximum length",
        };
        f.write_str(s)
    }
}

/// Verdict for one candidate reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyVerdict {
    Safe,
    Blocked(BlockCategory),
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }
}

struct Rule {
    category: BlockCategory,
    regex: Regex,
}

const SEXUAL_PATTERNS: &[&str] = &[
    r"\b(nudes?|naked\s+(pics?|photos?|selfies?)|dick\s+pics?|sexting|sext\s+me)\b",
    r"\b(blow\s*jobs?|hand\s*jobs?|porn|pussy|cock|orgasm|horny)\b",
    r"\bcum\s+(on|in|inside|for)\s+(me|you|my|your)\b",
    r"\b(have|having|had)\s+sex\s+with\b",
    r"\b(fuck|screw|bang)\s+(you|me|her|him)\s+(hard|all\s+night)\b",
];

const HARASSMENT_PATTERNS: &[&str] = &[
    r"\bfuck\s+(you|off)\b",
    r"\b(stupid|dumb|worthless|pathetic|ugly)\s+(bitch|whore|slut|cunt|idiot)\b",
    r"\b(bitch|whore|slut|cunt|retard(ed)?|faggot)\b",
    r"\bpiece\s+of\s+(shit|garbage|trash)\b",
    r"\bi('ll|\s+will)\s+(kill|hurt)\s+you\b",
    r"\bnobody\s+(likes|loves|wants)\s+you\s*([.!]|$)",
];

const SELF_HARM_PATTERNS: &[&str] = &[
    r"\b(kill|hurt|harm|cut)\s+(yourself|urself|ur\s+self)\b",
    r"\bkys\b",
    r"\bgo\s+(die|end\s+it(\s+all)?)\b",
    r"\bjust\s+die\s+already\b",
    r"\bshould\s+(just\s+)?(die|end\s+it(\s+all)?)\b",
    r"\b(commit|do)\s+suicide\b",
    r"\bend\s+your\s+(own\s+)?life\b",
    r"\bworld\s+(would\s+be|is)\s+better\s+without\s+you\b",
];

static BUILTIN_RULES: OnceLock<Vec<Rule>> = OnceLock::new();

/// Compiled built-in rules, shared by every filter.
///
/// The pattern tables are constants, so a pattern that fails to compile is
/// a programming error and panics on first use.
fn builtin_rules() -> &'static [Rule] {
    BUILTIN_RULES.get_or_init(|| {
        [
            (BlockCategory::SexualContent, SEXUAL_PATTERNS),
            (BlockCategory::Harassment, HARASSMENT_PATTERNS),
            (BlockCategory::SelfHarm, SELF_HARM_PATTERNS),
        ]
        .into_iter()
        .flat_map(|(category, patterns)| {
            patterns.iter().map(move |pattern| Rule {
                category,
                regex: RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .unwrap_or_else(|e| panic!("invalid safety pattern {pattern}: {e}")),
            })
        })
        .collect()
    })
}

/// Fold typographic apostrophes so `I’ll` matches the same rules as `I'll`.
fn normalize_quotes(text: &str) -> String {
    text.replace(&['\u{2019}', '\u{2018}', '\u{02BC}'][..], "'")
}

/// Stateless classifier over candidate reply text.
pub struct SafetyFilter {
    rules: &'static [Rule],
    blocklist: Vec<String>,
    max_length: Option<usize>,
}

impl SafetyFilter {
    /// Build the filter with the built-in rule set.
    ///
    /// `blocklist` terms are matched case-insensitively as substrings.
    /// `max_length` is in characters; `None` disables the length rule.
    pub fn new(blocklist: &[String], max_length: Option<usize>) -> Self {
        Self {
            rules: builtin_rules(),
            blocklist: blocklist
                .iter()
                .map(|t| normalize_quotes(t.trim()).to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            max_length,
        }
    }

    /// Classify `text`. Any matching rule blocks it.
    pub fn classify(&self, text: &str) -> SafetyVerdict {
        if let Some(max) = self.max_length {
            if text.chars().count() > max {
                return SafetyVerdict::Blocked(BlockCategory::TooLong);
            }
        }

        let text = normalize_quotes(text);
        if let Some(rule) = self.rules.iter().find(|r| r.regex.is_match(&text)) {
            return SafetyVerdict::Blocked(rule.category);
        }

        let lower = text.to_lowercase();
        if self.blocklist.iter().any(|term| lower.contains(term)) {
            return SafetyVerdict::Blocked(BlockCategory::Blocklist);
        }

        SafetyVerdict::Safe
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
