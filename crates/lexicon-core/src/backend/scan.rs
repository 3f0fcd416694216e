//! Query answers built from the three backend lookup shapes.
//!
//! These mirror the index-driven searches in `query`, using the same rack
//! and pattern predicates over per-length word lists, so a database tier
//! returns exactly what the in-memory index would for the same words.

use std::collections::BTreeSet;

use super::{BackendError, QueryBackend};
use crate::alphabet::NormalizedWord;
use crate::query::{LengthWindow, PatternQuery, RackSpec, WildcardMatches};

pub async fn search(backend: &dyn QueryBackend, word: &NormalizedWord) -> Result<bool, BackendError> {
    if word.is_empty() {
        return Ok(false);
    }
    backend.contains(word).await
}

pub async fn find_anagrams(
    backend: &dyn QueryBackend,
    word: &NormalizedWord,
) -> Result<Vec<String>, BackendError> {
    if word.is_empty() {
        return Ok(Vec::new());
    }
    let words: BTreeSet<String> = backend
        .words_by_alphagram(&word.alphagram())
        .await?
        .into_iter()
        .collect();
    Ok(words.into_iter().collect())
}

/// Words of `len` symbols that `rack` can spell.
async fn covered(
    backend: &dyn QueryBackend,
    len: usize,
    rack: &RackSpec,
    out: &mut BTreeSet<String>,
) -> Result<(), BackendError> {
    for entry in backend.words_by_length(len).await? {
        if rack.covers(&entry.normalized.counts()) {
            out.insert(entry.display);
        }
    }
    Ok(())
}

pub async fn wildcard_matches(
    backend: &dyn QueryBackend,
    rack: &RackSpec,
) -> Result<WildcardMatches, BackendError> {
    if rack.is_empty() {
        return Ok(WildcardMatches::default());
    }
    let base_len = rack.letters().total();
    let jokers = rack.jokers();

    let exact = if jokers == 0 {
        let words: BTreeSet<String> = backend
            .words_by_alphagram(&rack.letters().alphagram())
            .await?
            .into_iter()
            .collect();
        words.into_iter().collect()
    } else {
        Vec::new()
    };

    let mut wildcard = BTreeSet::new();
    if jokers > 0 {
        covered(backend, base_len + jokers, rack, &mut wildcard).await?;
    }

    // One drawn tile behaves like one more joker.
    let drawn = RackSpec::from_parts(rack.letters().clone(), (jokers + 1) as u8);
    let mut additional = BTreeSet::new();
    covered(backend, base_len + jokers + 1, &drawn, &mut additional).await?;

    Ok(WildcardMatches {
        exact,
        wildcard: wildcard.into_iter().collect(),
        additional: additional.into_iter().collect(),
    })
}

pub async fn sub_anagrams(
    backend: &dyn QueryBackend,
    rack: &RackSpec,
    min_length: usize,
) -> Result<Vec<String>, BackendError> {
    let min_length = min_length.max(1);
    let mut out = BTreeSet::new();
    for len in min_length..rack.len() {
        covered(backend, len, rack, &mut out).await?;
    }
    Ok(out.into_iter().collect())
}

pub async fn pattern_matches(
    backend: &dyn QueryBackend,
    query: &PatternQuery,
    window: LengthWindow,
) -> Result<Vec<String>, BackendError> {
    let mut out = BTreeSet::new();
    for len in window.min..=window.max {
        for entry in backend.words_by_length(len).await? {
            if query.pattern.matches(&entry.normalized, query.rack.as_ref()) {
                out.insert(entry.display);
            }
        }
    }
    Ok(out.into_iter().collect())
}
