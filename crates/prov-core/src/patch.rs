//! Whitespace analysis of unified diffs.
//!
//! Backends disagree on whether whitespace-only edits count as changes, so the
//! decision is an explicit [`WhitespacePolicy`] instead of a backend default.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, ProvError};

/// How whitespace-only differences in a working-copy diff are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WhitespacePolicy {
    /// Every byte of the diff matters.
    #[default]
    Significant,
    /// Diffs whose changed lines differ only in whitespace count as empty.
    Ignore,
}

impl WhitespacePolicy {
    /// Whether `diff` should be treated as "no change" under this policy.
    pub fn treats_as_clean(&self, diff: &str) -> bool {
        match self {
            WhitespacePolicy::Significant => diff.is_empty(),
            WhitespacePolicy::Ignore => diff.is_empty() || is_whitespace_only(diff),
        }
    }

    /// Normal form used when comparing two diffs.
    pub fn normalize(&self, diff: &str) -> String {
        match self {
            WhitespacePolicy::Significant => diff.to_string(),
            WhitespacePolicy::Ignore if self.treats_as_clean(diff) => String::new(),
            WhitespacePolicy::Ignore => diff
                .lines()
                .map(strip_whitespace)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl FromStr for WhitespacePolicy {
    type Err = ProvError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "significant" => Ok(WhitespacePolicy::Significant),
            "ignore" => Ok(WhitespacePolicy::Ignore),
            other => Err(ProvError::Config(
                ErrorInfo::new("whitespace_policy", format!("unknown whitespace policy '{other}'"))
                    .with_hint("expected 'significant' or 'ignore'"),
            )),
        }
    }
}

/// True when the added and removed lines of `diff` are the same multiset once
/// all whitespace is removed and blank lines are dropped.
pub fn is_whitespace_only(diff: &str) -> bool {
    let mut added = Vec::new();
    let mut removed = Vec::new();
    for line in diff.lines() {
        if line.starts_with("+++") || line.starts_with("---") {
            continue;
        }
        if let Some(rest) = line.strip_prefix('+') {
            added.push(strip_whitespace(rest));
        } else if let Some(rest) = line.strip_prefix('-') {
            removed.push(strip_whitespace(rest));
        } else if line.starts_with("Binary file") {
            return false;
        }
    }
    added.retain(|line| !line.is_empty());
    removed.retain(|line| !line.is_empty());
    added.sort();
    removed.sort();
    added == removed
}

fn strip_whitespace(line: &str) -> String {
    line.chars().filter(|c| !c.is_whitespace()).collect()
}
