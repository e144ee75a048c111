//! Sampling rules: a glob match over `{service, name, resource, tags}` plus
//! the rate and mechanism to apply when it matches.

use super::{SampleInput, SamplingMechanism};

/// One configured sampling rule. `None` on any matcher field means "match
/// anything" for that field.
#[derive(Clone, Debug)]
pub struct SamplingRule {
    pub service: Option<String>,
    pub name: Option<String>,
    pub resource: Option<String>,
    pub tags: Vec<(String, String)>,
    pub rate: f64,
    pub mechanism: SamplingMechanism,
    /// Only present on span sampling rules.
    pub max_per_second: Option<f64>,
}

impl SamplingRule {
    pub fn matches(&self, input: &SampleInput<'_>) -> bool {
        if let Some(service) = &self.service {
            if !glob_match(service, input.service) {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if !glob_match(name, input.name) {
                return false;
            }
        }
        if let Some(resource) = &self.resource {
            if !glob_match(resource, input.resource) {
                return false;
            }
        }
        for (key, pattern) in &self.tags {
            match input.tags.get(key) {
                Some(value) if glob_match(pattern, value) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Anchored glob match supporting `*` (any run of characters, including
/// none) and `?` (exactly one character). Case-sensitive, matching
/// dd-trace's own rule matchers.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    glob_match_inner(&pattern, &text)
}

fn glob_match_inner(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            glob_match_inner(&pattern[1..], text)
                || (!text.is_empty() && glob_match_inner(pattern, &text[1..]))
        }
        Some('?') => !text.is_empty() && glob_match_inner(&pattern[1..], &text[1..]),
        Some(c) => {
            !text.is_empty() && text[0] == *c && glob_match_inner(&pattern[1..], &text[1..])
        }
    }
}
