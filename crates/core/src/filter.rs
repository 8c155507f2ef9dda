// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered include/exclude path filters.
//!
//! Rules follow the common `+ pattern` / `- pattern` convention: the rule
//! list is matched top to bottom against a slash-separated relative path,
//! and the first matching rule decides. An unmatched path is included.
//!
//! Dialect: a pattern matches a path when the path equals the pattern or
//! the pattern is a whole-segment prefix of the path (so `- tmp` excludes
//! `tmp` and `tmp/a.txt`, not `tmpfile`). A trailing `/` on the pattern
//! restricts it to directory contents. Leading `/` on either side is
//! ignored.

use serde::{Deserialize, Serialize};

/// What a matched rule does with the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterAction {
    Include,
    Exclude,
}

/// One parsed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub action: FilterAction,
    pub pattern: String,
}

impl FilterRule {
    /// Parse a single rule line. `+ p` includes, `- p` excludes; a bare
    /// pattern is an include. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (action, rest) = match line.split_once(' ') {
            Some(("+", rest)) => (FilterAction::Include, rest),
            Some(("-", rest)) => (FilterAction::Exclude, rest),
            _ => (FilterAction::Include, line),
        };
        let pattern = rest.trim().trim_start_matches('/').to_string();
        if pattern.is_empty() {
            return None;
        }
        Some(Self { action, pattern })
    }

    fn matches(&self, path: &str) -> bool {
        let pattern = self.pattern.as_str();
        if let Some(dir) = pattern.strip_suffix('/') {
            return path.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'));
        }
        match path.strip_prefix(pattern) {
            Some("") => true,
            Some(rest) => rest.starts_with('/'),
            None => false,
        }
    }
}

/// An ordered rule list applied to relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    rules: Vec<FilterRule>,
}

impl FilterSet {
    /// Parse rule lines in order, dropping blanks and comments.
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Self {
        Self { rules: lines.iter().filter_map(|l| FilterRule::parse(l.as_ref())).collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// First matching rule wins; default is include.
    pub fn decide(&self, path: &str) -> FilterAction {
        let path = path.trim_start_matches('/');
        for rule in &self.rules {
            if rule.matches(path) {
                return rule.action;
            }
        }
        FilterAction::Include
    }

    pub fn includes(&self, path: &str) -> bool {
        self.decide(path) == FilterAction::Include
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
