//! Anagram, wildcard and sub-anagram search over the in-memory index.

use std::collections::BTreeSet;

use super::rack::RackSpec;
use super::WildcardMatches;
use crate::alphabet::{Alphagram, LetterCounts, COLLATION};
use crate::index::LexiconIndex;

/// Every multiset of `slots` extra symbols added to `base`, as alphagrams.
/// Fills are combinations with repetition, so each multiset appears once.
pub fn fill_alphagrams(base: &LetterCounts, slots: usize) -> Vec<Alphagram> {
    let mut out = Vec::new();
    let mut chosen: Vec<usize> = Vec::with_capacity(slots);
    fill_rec(base, slots, 0, &mut chosen, &mut out);
    out
}

fn fill_rec(
    base: &LetterCounts,
    slots: usize,
    from: usize,
    chosen: &mut Vec<usize>,
    out: &mut Vec<Alphagram>,
) {
    if chosen.len() == slots {
        let mut counts = base.clone();
        for &i in chosen.iter() {
            counts.add(COLLATION[i]);
        }
        out.push(counts.alphagram());
        return;
    }
    for i in from..COLLATION.len() {
        chosen.push(i);
        fill_rec(base, slots, i, chosen, out);
        chosen.pop();
    }
}

fn lookup_all(index: &LexiconIndex, len: usize, base: &LetterCounts, slots: usize) -> Vec<String> {
    let mut out = BTreeSet::new();
    for alphagram in fill_alphagrams(base, slots) {
        out.extend(index.anagram_bucket(len, &alphagram).iter().cloned());
    }
    out.into_iter().collect()
}

/// Exact, joker-filled and one-extra-tile anagrams of `rack`.
pub fn wildcard_matches(index: &LexiconIndex, rack: &RackSpec) -> WildcardMatches {
    if rack.is_empty() {
        return WildcardMatches::default();
    }
    let letters = rack.letters();
    let base_len = letters.total();
    let jokers = rack.jokers();

    let exact = if jokers == 0 {
        let mut words = index
            .anagram_bucket(base_len, &letters.alphagram())
            .to_vec();
        words.sort();
        words
    } else {
        Vec::new()
    };
    let wildcard = if jokers > 0 {
        lookup_all(index, base_len + jokers, letters, jokers)
    } else {
        Vec::new()
    };
    let additional = lookup_all(index, base_len + jokers + 1, letters, jokers + 1);

    WildcardMatches {
        exact,
        wildcard,
        additional,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubAnagramStrategy {
    /// Enumerate the rack's distinct sub-multisets and look each one up.
    EnumerateSubsets,
    /// Walk every bucket of each target length and test containment.
    ScanLengths,
}

/// Pick the cheaper strategy for this rack and index.
pub fn choose_strategy(index: &LexiconIndex, rack: &RackSpec, min_length: usize) -> SubAnagramStrategy {
    if rack.jokers() > 0 {
        return SubAnagramStrategy::ScanLengths;
    }
    let subsets = rack
        .letters()
        .distinct()
        .try_fold(1usize, |acc, (_, n)| acc.checked_mul(n + 1));
    let buckets: usize = (min_length..rack.len()).map(|len| index.bucket_count(len)).sum();
    match subsets {
        Some(n) if n <= buckets => SubAnagramStrategy::EnumerateSubsets,
        _ => SubAnagramStrategy::ScanLengths,
    }
}

/// Words strictly shorter than the rack and at least `min_length` long that
/// the rack can spell, jokers covering any shortfall.
pub fn sub_anagrams(index: &LexiconIndex, rack: &RackSpec, min_length: usize) -> Vec<String> {
    let min_length = min_length.max(1);
    let strategy = choose_strategy(index, rack, min_length);
    sub_anagrams_with(index, rack, min_length, strategy)
}

pub fn sub_anagrams_with(
    index: &LexiconIndex,
    rack: &RackSpec,
    min_length: usize,
    strategy: SubAnagramStrategy,
) -> Vec<String> {
    let min_length = min_length.max(1);
    if rack.len() <= min_length {
        return Vec::new();
    }
    let mut out = BTreeSet::new();
    match strategy {
        SubAnagramStrategy::ScanLengths => {
            for len in min_length..rack.len() {
                for (alphagram, words) in index.buckets_of_length(len) {
                    if rack.covers(&alphagram.counts()) {
                        out.extend(words.iter().cloned());
                    }
                }
            }
        }
        SubAnagramStrategy::EnumerateSubsets => {
            let distinct: Vec<(char, usize)> = rack.letters().distinct().collect();
            let mut current = LetterCounts::new();
            enumerate_subsets(&distinct, 0, &mut current, &mut |subset| {
                let len = subset.total();
                if len >= min_length && len < rack.len() {
                    out.extend(index.anagram_bucket(len, &subset.alphagram()).iter().cloned());
                }
            });
        }
    }
    out.into_iter().collect()
}

fn enumerate_subsets(
    distinct: &[(char, usize)],
    at: usize,
    current: &mut LetterCounts,
    visit: &mut dyn FnMut(&LetterCounts),
) {
    let Some(&(c, max)) = distinct.get(at) else {
        visit(current);
        return;
    };
    enumerate_subsets(distinct, at + 1, current, visit);
    for taken in 1..=max {
        current.add(c);
        enumerate_subsets(distinct, at + 1, current, visit);
        if taken == max {
            for _ in 0..max {
                current.remove(c);
            }
        }
    }
}
