//! Positional pattern grammar.
//!
//! Letters match themselves, `.` matches one symbol and `*` (or its hyphen
//! shorthand `-`) matches any run of symbols. A pattern is always anchored at
//! both ends, so `-AR` reads as "ends with AR", `CO-` as "starts with CO",
//! `-CI-` as "contains CI" and `-PUCH-R` as "contains PUCH, ends with R".
//! Every spelling reduces to one canonical [`Pattern`].

use std::fmt;

use super::rack::{split_length_suffix, RackSpec};
use super::QueryError;
use crate::alphabet::{self, is_symbol, LetterCounts, NormalizedWord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Letter(char),
    Any,
}

impl Slot {
    fn accepts(self, c: char) -> bool {
        match self {
            Slot::Letter(l) => l == c,
            Slot::Any => true,
        }
    }
}

/// Canonical anchored form: a start anchor, ordered runs the word must
/// contain, and an end anchor. A pattern with no variable-length marker is
/// not floating and `prefix` spells out the whole word.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    prefix: Vec<Slot>,
    infixes: Vec<Vec<Slot>>,
    suffix: Vec<Slot>,
    floating: bool,
}

enum Token {
    Slot(Slot),
    Star,
}

impl Pattern {
    pub fn parse(text: &str) -> Result<Self, QueryError> {
        let trimmed = text.trim();
        let trimmed = trimmed.strip_prefix('^').unwrap_or(trimmed);
        let trimmed = trimmed.strip_suffix('$').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(QueryError::InvalidPattern("empty pattern".into()));
        }

        let normalized = alphabet::normalize(trimmed);
        let mut tokens = Vec::with_capacity(normalized.len());
        for c in normalized.symbols() {
            let token = match c {
                '.' => Token::Slot(Slot::Any),
                '*' | '-' => Token::Star,
                c if is_symbol(c) => Token::Slot(Slot::Letter(c)),
                c => {
                    return Err(QueryError::InvalidPattern(format!(
                        "unexpected character {c:?} in {text:?}"
                    )))
                }
            };
            tokens.push(token);
        }

        let mut parts: Vec<Vec<Slot>> = vec![Vec::new()];
        for token in tokens {
            match token {
                Token::Slot(slot) => {
                    if let Some(part) = parts.last_mut() {
                        part.push(slot);
                    }
                }
                Token::Star => parts.push(Vec::new()),
            }
        }

        if parts.len() == 1 {
            return Ok(Self {
                prefix: parts.pop().unwrap_or_default(),
                infixes: Vec::new(),
                suffix: Vec::new(),
                floating: false,
            });
        }
        let suffix = parts.pop().unwrap_or_default();
        let mut parts = parts.into_iter();
        let prefix = parts.next().unwrap_or_default();
        let infixes = parts.filter(|p| !p.is_empty()).collect();
        Ok(Self {
            prefix,
            infixes,
            suffix,
            floating: true,
        })
    }

    pub fn prefix(&self) -> &[Slot] {
        &self.prefix
    }

    pub fn infixes(&self) -> &[Vec<Slot>] {
        &self.infixes
    }

    pub fn suffix(&self) -> &[Slot] {
        &self.suffix
    }

    pub fn is_floating(&self) -> bool {
        self.floating
    }

    /// Shortest word the pattern can match.
    pub fn min_len(&self) -> usize {
        self.prefix.len() + self.suffix.len() + self.infixes.iter().map(Vec::len).sum::<usize>()
    }

    fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.prefix
            .iter()
            .chain(self.infixes.iter().flatten())
            .chain(self.suffix.iter())
    }

    /// Letters fixed by the pattern itself. They never cost rack tiles.
    pub fn fixed_letters(&self) -> LetterCounts {
        LetterCounts::from_symbols(self.slots().filter_map(|s| match s {
            Slot::Letter(c) => Some(*c),
            Slot::Any => None,
        }))
    }

    pub fn fixed_count(&self) -> usize {
        self.slots().filter(|s| matches!(s, Slot::Letter(_))).count()
    }

    /// Structural match over internal symbols, ignoring any rack.
    pub fn matches_symbols(&self, word: &[char]) -> bool {
        if !self.floating {
            return word.len() == self.prefix.len() && run_matches(&self.prefix, word);
        }
        if word.len() < self.min_len() {
            return false;
        }
        let (head, rest) = word.split_at(self.prefix.len());
        let (middle, tail) = rest.split_at(rest.len() - self.suffix.len());
        if !run_matches(&self.prefix, head) || !run_matches(&self.suffix, tail) {
            return false;
        }
        // Leftmost placement of each run leaves the most room for the next.
        let mut from = 0;
        for infix in &self.infixes {
            match find_run(infix, &middle[from..]) {
                Some(at) => from += at + infix.len(),
                None => return false,
            }
        }
        true
    }

    /// Structural match plus rack accounting: the word's letters minus the
    /// pattern's fixed letters must be payable from the rack.
    pub fn matches(&self, word: &NormalizedWord, rack: Option<&RackSpec>) -> bool {
        let symbols: Vec<char> = word.symbols().collect();
        if !self.matches_symbols(&symbols) {
            return false;
        }
        match rack {
            Some(rack) => rack.covers(&word.counts().saturating_sub(&self.fixed_letters())),
            None => true,
        }
    }
}

fn run_matches(run: &[Slot], symbols: &[char]) -> bool {
    run.len() == symbols.len() && run.iter().zip(symbols).all(|(s, c)| s.accepts(*c))
}

fn find_run(run: &[Slot], haystack: &[char]) -> Option<usize> {
    if run.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - run.len()).find(|&i| run_matches(run, &haystack[i..i + run.len()]))
}

fn write_run(f: &mut fmt::Formatter<'_>, run: &[Slot]) -> fmt::Result {
    for slot in run {
        match slot {
            Slot::Letter(c) => write!(f, "{c}")?,
            Slot::Any => f.write_str(".")?,
        }
    }
    Ok(())
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_run(f, &self.prefix)?;
        if self.floating {
            f.write_str("*")?;
            for infix in &self.infixes {
                write_run(f, infix)?;
                f.write_str("*")?;
            }
            write_run(f, &self.suffix)?;
        }
        Ok(())
    }
}

/// A full pattern request: `PATTERN[:N][,RACK]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternQuery {
    pub pattern: Pattern,
    pub rack: Option<RackSpec>,
    pub length: Option<usize>,
}

impl PatternQuery {
    pub fn parse(text: &str, max_wildcards: u8) -> Result<Self, QueryError> {
        let (head, rack_text) = match text.split_once(',') {
            Some((head, rack)) => (head, Some(rack)),
            None => (text, None),
        };
        let (pattern_text, mut length) = split_length_suffix(head)?;
        let pattern = Pattern::parse(pattern_text)?;

        let rack = match rack_text.map(str::trim) {
            Some(r) if !r.is_empty() => {
                let rack = RackSpec::parse(r, max_wildcards)?;
                length = length.or(rack.explicit_length());
                Some(rack)
            }
            _ => None,
        };
        Ok(Self {
            pattern,
            rack,
            length,
        })
    }
}

/// Inclusive bounds on candidate word length, in symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthWindow {
    pub min: usize,
    pub max: usize,
}

impl LengthWindow {
    pub fn contains(&self, len: usize) -> bool {
        (self.min..=self.max).contains(&len)
    }
}

/// Length policy for pattern results. Without an explicit length, results
/// are either the short words (`<= default_max_length`) or, with
/// `show_longer`, only the longer ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthFilter {
    pub show_longer: bool,
    pub default_max_length: usize,
    pub explicit_length: Option<usize>,
    pub max_word_length: usize,
}

impl Default for LengthFilter {
    fn default() -> Self {
        Self {
            show_longer: false,
            default_max_length: 8,
            explicit_length: None,
            max_word_length: 15,
        }
    }
}

impl LengthFilter {
    /// Candidate lengths for `query`, or `None` when nothing can match.
    pub fn window(&self, query: &PatternQuery) -> Option<LengthWindow> {
        let (mut min, mut max) = match self.explicit_length.or(query.length) {
            Some(n) => (n, n),
            None if self.show_longer => (self.default_max_length + 1, self.max_word_length),
            None => (1, self.default_max_length),
        };
        min = min.max(query.pattern.min_len()).max(1);
        if !query.pattern.is_floating() {
            max = max.min(query.pattern.min_len());
        }
        if let Some(rack) = &query.rack {
            max = max.min(query.pattern.fixed_count() + rack.len());
        }
        (min <= max).then_some(LengthWindow { min, max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::normalize;

    fn matches(pattern: &str, word: &str) -> bool {
        Pattern::parse(pattern).unwrap().matches(&normalize(word), None)
    }

    #[test]
    fn hyphen_and_star_forms_are_equal() {
        assert_eq!(Pattern::parse("-AR").unwrap(), Pattern::parse("*AR").unwrap());
        assert_eq!(Pattern::parse("CO-").unwrap(), Pattern::parse("^CO*$").unwrap());
        assert_eq!(Pattern::parse("-CI-").unwrap(), Pattern::parse("**CI--").unwrap());
        assert_eq!(Pattern::parse("-PUCH-R").unwrap(), Pattern::parse("*PUCH*R").unwrap());
    }

    #[test]
    fn canonical_anchors() {
        let ends = Pattern::parse("-ar").unwrap();
        assert!(ends.prefix().is_empty());
        assert_eq!(ends.suffix(), [Slot::Letter('A'), Slot::Letter('R')]);

        let contains = Pattern::parse("-ci-").unwrap();
        assert!(contains.prefix().is_empty() && contains.suffix().is_empty());
        assert_eq!(contains.infixes().len(), 1);

        let exact = Pattern::parse("ca.a").unwrap();
        assert!(!exact.is_floating());
        assert_eq!(exact.to_string(), "CA.A");
        assert_eq!(Pattern::parse("-PUCH-R").unwrap().to_string(), "*PUÇ*R");
    }

    #[test]
    fn ends_with_starts_with_contains() {
        assert!(matches("-AR", "jugar"));
        assert!(matches("-AR", "cantar"));
        assert!(!matches("-AR", "arma"));
        assert!(matches("AR-", "arma"));
        assert!(!matches("AR-", "jugar"));
        assert!(matches("-CI-", "cocina"));
        assert!(!matches("-CI-", "cantar"));
        assert!(matches("-PUCH-R", "empuchar"));
        assert!(!matches("-PUCH-R", "empucha"));
    }

    #[test]
    fn dot_and_digraphs() {
        assert!(matches("CA.A", "casa"));
        assert!(!matches("CA.A", "casas"));
        // CH is one symbol, so a single dot covers it.
        assert!(matches(".OZA", "choza"));
        assert!(!matches("..OZA", "choza"));
    }

    #[test]
    fn star_matches_empty_run() {
        assert!(matches("CA*SA", "casa"));
        assert!(matches("*", "a"));
        assert!(!matches("CA*SA", "casas"));
    }

    #[test]
    fn rack_accounting_ignores_fixed_letters() {
        let q = PatternQuery::parse(".R..C...,AEOSNT", 2).unwrap();
        let rack = q.rack.as_ref();
        assert!(q.pattern.matches(&normalize("ERNACTOS"), rack));
        assert!(!q.pattern.matches(&normalize("ERNACTAS"), rack));
        assert!(!q.pattern.matches(&normalize("ERNACTOR"), rack));
        assert!(!q.pattern.matches(&normalize("XRNACTOS"), rack));

        let with_joker = PatternQuery::parse(".R..C...,AEOSN?", 2).unwrap();
        assert!(with_joker
            .pattern
            .matches(&normalize("ERNACTOS"), with_joker.rack.as_ref()));
    }

    #[test]
    fn rack_accounting_with_leading_star() {
        let q = PatternQuery::parse("-AR,JUG", 2).unwrap();
        assert!(q.pattern.matches(&normalize("jugar"), q.rack.as_ref()));
        assert!(!q.pattern.matches(&normalize("cantar"), q.rack.as_ref()));
    }

    #[test]
    fn query_parses_length_and_rack() {
        let q = PatternQuery::parse("CO*:7,ABC", 2).unwrap();
        assert_eq!(q.length, Some(7));
        assert_eq!(q.rack.as_ref().map(RackSpec::len), Some(3));

        let q = PatternQuery::parse("CO*,ABC?:6", 2).unwrap();
        assert_eq!(q.length, Some(6));

        assert!(PatternQuery::parse("CO*,ABC???", 2).is_err());
        assert!(matches!(
            PatternQuery::parse("C0*", 2),
            Err(QueryError::InvalidPattern(_))
        ));
        assert!(matches!(
            PatternQuery::parse("", 2),
            Err(QueryError::InvalidPattern(_))
        ));
    }

    #[test]
    fn length_window_policy() {
        let q = PatternQuery::parse("CO*", 2).unwrap();
        let short = LengthFilter::default();
        assert_eq!(short.window(&q), Some(LengthWindow { min: 2, max: 8 }));

        let longer = LengthFilter {
            show_longer: true,
            ..LengthFilter::default()
        };
        assert_eq!(longer.window(&q), Some(LengthWindow { min: 9, max: 15 }));

        let pinned = LengthFilter {
            explicit_length: Some(5),
            ..LengthFilter::default()
        };
        assert_eq!(pinned.window(&q), Some(LengthWindow { min: 5, max: 5 }));

        let racked = PatternQuery::parse("CO*,AB", 2).unwrap();
        assert_eq!(short.window(&racked), Some(LengthWindow { min: 2, max: 4 }));

        let exact = PatternQuery::parse("CA.A", 2).unwrap();
        assert_eq!(longer.window(&exact), None);
        assert_eq!(short.window(&exact), Some(LengthWindow { min: 4, max: 4 }));
    }
}
