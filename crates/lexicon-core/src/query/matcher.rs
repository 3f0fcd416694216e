//! Pattern search driven by the trie.
//!
//! Positional slots are filled by following trie children, so every fill is
//! a live prefix of some word. With a rack, each `.` is paid with a rack
//! letter when one is available and with a joker otherwise; branches that
//! cannot be paid are cut. Variable-length tails are enumerated below the
//! start anchor up to the length window and checked structurally.

use std::collections::BTreeSet;

use super::pattern::{LengthWindow, PatternQuery, Slot};
use super::rack::RackSpec;
use crate::alphabet::{LetterCounts, NormalizedWord};
use crate::index::{LexiconIndex, TrieNode};

#[derive(Clone)]
struct Budget {
    letters: LetterCounts,
    jokers: usize,
}

impl Budget {
    fn from_rack(rack: &RackSpec) -> Self {
        Self {
            letters: rack.letters().clone(),
            jokers: rack.jokers(),
        }
    }

    /// Pay for `c`, preferring a real tile over a joker.
    fn pay(&self, c: char) -> Option<Budget> {
        let mut next = self.clone();
        if next.letters.remove(c) {
            Some(next)
        } else if next.jokers > 0 {
            next.jokers -= 1;
            Some(next)
        } else {
            None
        }
    }
}

struct Frontier<'a> {
    node: &'a TrieNode,
    path: String,
    depth: usize,
}

/// Walk `slots` from the root, returning every node reachable by a payable
/// fill.
fn walk_slots<'a>(root: &'a TrieNode, slots: &[Slot], rack: Option<&RackSpec>) -> Vec<Frontier<'a>> {
    let mut reached = Vec::new();
    let mut stack: Vec<(Frontier<'a>, Option<Budget>)> = vec![(
        Frontier {
            node: root,
            path: String::new(),
            depth: 0,
        },
        rack.map(Budget::from_rack),
    )];

    while let Some((at, budget)) = stack.pop() {
        let Some(slot) = slots.get(at.depth) else {
            reached.push(at);
            continue;
        };
        match slot {
            Slot::Letter(c) => {
                if let Some(child) = at.node.child(*c) {
                    stack.push((step(&at, *c, child), budget));
                }
            }
            Slot::Any => {
                for (c, child) in at.node.children() {
                    let paid = match &budget {
                        Some(b) => match b.pay(c) {
                            Some(next) => Some(next),
                            None => continue,
                        },
                        None => None,
                    };
                    stack.push((step(&at, c, child), paid));
                }
            }
        }
    }
    reached
}

fn step<'a>(at: &Frontier<'a>, c: char, child: &'a TrieNode) -> Frontier<'a> {
    let mut path = at.path.clone();
    path.push(c);
    Frontier {
        node: child,
        path,
        depth: at.depth + 1,
    }
}

/// Every display word matching `query` with a length inside `window`,
/// deduplicated and sorted.
pub fn find_pattern_matches(
    index: &LexiconIndex,
    query: &PatternQuery,
    window: LengthWindow,
) -> Vec<String> {
    let pattern = &query.pattern;
    let rack = query.rack.as_ref();
    let mut out = BTreeSet::new();

    let starts = walk_slots(index.root(), pattern.prefix(), rack);
    if !pattern.is_floating() {
        for at in starts {
            if window.contains(at.depth) {
                if let Some(w) = at.node.word() {
                    out.insert(w.to_string());
                }
            }
        }
        return out.into_iter().collect();
    }

    for start in starts {
        let mut stack = vec![start];
        while let Some(at) = stack.pop() {
            if at.depth >= window.min {
                if let Some(w) = at.node.word() {
                    let word = NormalizedWord::from_symbols(at.path.chars());
                    if pattern.matches(&word, rack) {
                        out.insert(w.to_string());
                    }
                }
            }
            if at.depth < window.max {
                for (c, child) in at.node.children() {
                    stack.push(step(&at, c, child));
                }
            }
        }
    }
    out.into_iter().collect()
}
