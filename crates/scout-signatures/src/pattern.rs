//! Labeled regex patterns
//!
//! A [`LabeledPattern`] pairs a compiled regex with the short label that
//! becomes the evidence string when the pattern fires.

use regex::Regex;

/// A compiled pattern plus the label reported as evidence on a match.
#[derive(Debug, Clone)]
pub struct LabeledPattern {
    /// Short human-readable rule name (e.g. "User Access Verification").
    pub label: &'static str,
    regex: Regex,
}

impl LabeledPattern {
    /// Compile a pattern. Panics on an invalid expression; every pattern
    /// in this crate is a hand-written literal exercised by tests.
    pub fn new(label: &'static str, pattern: &str) -> Self {
        Self {
            label,
            regex: compile(pattern),
        }
    }

    /// Whether the pattern fires against the given text.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Compile a hand-written pattern literal.
pub(crate) fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(err) => panic!("builtin pattern {pattern:?} failed to compile: {err}"),
    }
}

/// Compile a list of scrape patterns, skipping empty entries.
pub(crate) fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| compile(p))
        .collect()
}
