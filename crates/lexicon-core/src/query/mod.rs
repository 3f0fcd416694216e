//! Combination and pattern engine.
//!
//! Rack parsing, joker fan-out, sub-anagram search and positional patterns.
//! The functions here answer queries from a [`LexiconIndex`] directly; the
//! predicates they are built on (`RackSpec::covers`, `Pattern::matches`) are
//! shared with the scan-based tiers so every tier agrees on results.

mod anagram;
mod matcher;
mod pattern;
mod rack;

pub use anagram::{
    choose_strategy, fill_alphagrams, sub_anagrams, sub_anagrams_with, wildcard_matches,
    SubAnagramStrategy,
};
pub use pattern::{LengthFilter, LengthWindow, Pattern, PatternQuery, Slot};
pub use rack::{RackSpec, SUPPORTED_MAX_WILDCARDS};

use crate::alphabet;
use crate::index::LexiconIndex;

/// Input-shape errors. Absence of results is never an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("too many wildcards: {found} (max {max})")]
    TooManyWildcards { found: usize, max: u8 },

    #[error("wildcard limit {0} exceeds the supported maximum")]
    UnsupportedWildcardLimit(u8),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid rack: {0}")]
    InvalidRack(String),

    #[error("invalid length: {0}")]
    InvalidLength(String),
}

/// Results of a joker-aware anagram search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WildcardMatches {
    /// Anagrams using exactly the rack letters. Only filled when the rack
    /// has no jokers.
    pub exact: Vec<String>,
    /// Words using every rack letter plus one symbol per joker.
    pub wildcard: Vec<String>,
    /// Words one tile longer than the rack.
    pub additional: Vec<String>,
}

impl WildcardMatches {
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.wildcard.is_empty() && self.additional.is_empty()
    }
}

pub fn search(index: &LexiconIndex, text: &str) -> bool {
    index.search(text)
}

/// Every word whose letters are exactly the letters of `text`.
pub fn find_anagrams(index: &LexiconIndex, text: &str) -> Vec<String> {
    let word = alphabet::normalize(text.trim());
    let mut words = index.anagrams_of(&word).to_vec();
    words.sort();
    words
}

pub fn find_anagrams_with_wildcards(
    index: &LexiconIndex,
    text: &str,
    max_wildcards: u8,
) -> Result<WildcardMatches, QueryError> {
    let rack = RackSpec::parse(text, max_wildcards)?;
    Ok(wildcard_matches(index, &rack))
}

pub fn find_sub_anagrams(
    index: &LexiconIndex,
    text: &str,
    min_length: usize,
    max_wildcards: u8,
) -> Result<Vec<String>, QueryError> {
    let rack = RackSpec::parse(text, max_wildcards)?;
    Ok(sub_anagrams(index, &rack, min_length))
}

pub fn find_pattern_matches(
    index: &LexiconIndex,
    query: &PatternQuery,
    filter: &LengthFilter,
) -> Vec<String> {
    match filter.window(query) {
        Some(window) => matcher::find_pattern_matches(index, query, window),
        None => Vec::new(),
    }
}
