//! Spanish lexicon alphabet.
//!
//! Words are stored and compared over an internal symbol set where each
//! Scrabble tile is exactly one `char`: the 26 Latin letters, `Ñ`, and the
//! digraphs CH, LL and RR folded into `Ç`, `Ŀ` and `Ř`. Accents are stripped
//! during normalization and are not restored for display.

use std::cmp::Ordering;
use std::fmt;

use tracing::warn;
use unicode_normalization::UnicodeNormalization;

pub const CH: char = 'Ç';
pub const LL: char = 'Ŀ';
pub const RR: char = 'Ř';
pub const ENYE: char = 'Ñ';

/// The rack joker.
pub const JOKER: char = '?';

/// Every internal symbol, in alphagram collation order: vowels first, then
/// consonants with each digraph right after its base letter.
pub const COLLATION: [char; 30] = [
    'A', 'E', 'I', 'O', 'U', 'B', 'C', CH, 'D', 'F', 'G', 'H', 'J', 'K', 'L', LL, 'M', 'N', ENYE,
    'P', 'Q', 'R', RR, 'S', 'T', 'V', 'W', 'X', 'Y', 'Z',
];

pub const ALPHABET_LEN: usize = COLLATION.len();

const DIGRAPHS: [(&str, char); 3] = [("CH", CH), ("LL", LL), ("RR", RR)];

// Private-use stand-ins for symbols that NFD would otherwise decompose.
const PROTECTED: [(char, char); 4] = [
    (ENYE, '\u{E000}'),
    (CH, '\u{E001}'),
    (LL, '\u{E002}'),
    (RR, '\u{E003}'),
];

/// Collation rank of an internal symbol, `None` outside the alphabet.
pub fn rank(c: char) -> Option<usize> {
    let r = match c {
        'A' => 0,
        'E' => 1,
        'I' => 2,
        'O' => 3,
        'U' => 4,
        'B' => 5,
        'C' => 6,
        CH => 7,
        'D' => 8,
        'F' => 9,
        'G' => 10,
        'H' => 11,
        'J' => 12,
        'K' => 13,
        'L' => 14,
        LL => 15,
        'M' => 16,
        'N' => 17,
        ENYE => 18,
        'P' => 19,
        'Q' => 20,
        'R' => 21,
        RR => 22,
        'S' => 23,
        'T' => 24,
        'V' => 25,
        'W' => 26,
        'X' => 27,
        'Y' => 28,
        'Z' => 29,
        _ => return None,
    };
    Some(r)
}

pub fn is_symbol(c: char) -> bool {
    rank(c).is_some()
}

/// Total order used for alphagrams. Unknown symbols sort after every known
/// one and by code point among themselves.
pub fn compare_symbols(a: char, b: char) -> Ordering {
    match (rank(a), rank(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(&b),
    }
}

/// A word over the internal alphabet. Its length is the tile count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NormalizedWord(String);

impl NormalizedWord {
    /// Wrap symbols that are already normalized (e.g. a trie path).
    pub fn from_symbols<I: IntoIterator<Item = char>>(symbols: I) -> Self {
        Self(symbols.into_iter().collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn symbols(&self) -> std::str::Chars<'_> {
        self.0.chars()
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn alphagram(&self) -> Alphagram {
        Alphagram::from_symbols(self.symbols())
    }

    pub fn counts(&self) -> LetterCounts {
        LetterCounts::from_symbols(self.symbols())
    }

    pub fn to_display(&self) -> String {
        to_display(&self.0)
    }
}

impl fmt::Display for NormalizedWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The symbols of a word sorted by collation order. Two words are anagrams
/// exactly when their alphagrams are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Alphagram(String);

impl Alphagram {
    pub fn from_symbols<I: IntoIterator<Item = char>>(symbols: I) -> Self {
        let mut sorted: Vec<char> = symbols.into_iter().collect();
        sorted.sort_by(|a, b| compare_symbols(*a, *b));
        // Unknown symbols sort to the tail.
        if let Some(first_unknown) = sorted.iter().position(|c| !is_symbol(*c)) {
            let unknown: String = sorted[first_unknown..].iter().collect();
            warn!(%unknown, "symbols outside the lexicon alphabet");
        }
        Self(sorted.into_iter().collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn counts(&self) -> LetterCounts {
        LetterCounts::from_symbols(self.0.chars())
    }
}

impl fmt::Display for Alphagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Map arbitrary user or corpus text onto the internal alphabet.
///
/// Uppercases, strips combining accents (U+0300..=U+036F) while keeping `Ñ`
/// and any digraph symbols already present, then folds CH, LL and RR in that
/// order, each pass scanning left to right without overlap. Idempotent.
pub fn normalize(text: &str) -> NormalizedWord {
    let upper: String = text.nfc().collect::<String>().to_uppercase();
    let guarded: String = upper.chars().map(protect).collect();
    let stripped: String = guarded
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036F}').contains(c))
        .map(unprotect)
        .collect();
    NormalizedWord(fold_digraphs(stripped))
}

pub fn alphagram(text: &str) -> Alphagram {
    normalize(text).alphagram()
}

/// Expand digraph symbols back to their two-letter spelling.
pub fn to_display(word: &str) -> String {
    let mut out = String::with_capacity(word.len() + 4);
    for c in word.chars() {
        match c {
            CH => out.push_str("CH"),
            LL => out.push_str("LL"),
            RR => out.push_str("RR"),
            other => out.push(other),
        }
    }
    out
}

fn protect(c: char) -> char {
    PROTECTED
        .iter()
        .find(|(sym, _)| *sym == c)
        .map_or(c, |(_, placeholder)| *placeholder)
}

fn unprotect(c: char) -> char {
    PROTECTED
        .iter()
        .find(|(_, placeholder)| *placeholder == c)
        .map_or(c, |(sym, _)| *sym)
}

fn fold_digraphs(mut s: String) -> String {
    let mut buf = [0u8; 4];
    for (pair, sym) in DIGRAPHS {
        if s.contains(pair) {
            s = s.replace(pair, sym.encode_utf8(&mut buf));
        }
    }
    s
}

/// Multiset of symbols. Known symbols live in a fixed array indexed by
/// collation rank; anything else goes to a short overflow list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LetterCounts {
    known: [u16; ALPHABET_LEN],
    other: Vec<(char, u16)>,
    total: usize,
}

impl LetterCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_symbols<I: IntoIterator<Item = char>>(symbols: I) -> Self {
        let mut counts = Self::new();
        for c in symbols {
            counts.add(c);
        }
        counts
    }

    pub fn add(&mut self, c: char) {
        match rank(c) {
            Some(r) => self.known[r] = self.known[r].saturating_add(1),
            // Overflow stays sorted by code point, matching alphagram order.
            None => match self.other.binary_search_by(|(o, _)| o.cmp(&c)) {
                Ok(i) => self.other[i].1 = self.other[i].1.saturating_add(1),
                Err(i) => self.other.insert(i, (c, 1)),
            },
        }
        self.total += 1;
    }

    /// Take one `c` out of the multiset. Returns false if none was present.
    pub fn remove(&mut self, c: char) -> bool {
        match rank(c) {
            Some(r) => {
                if self.known[r] == 0 {
                    return false;
                }
                self.known[r] -= 1;
            }
            None => {
                let Some(i) = self.other.iter().position(|(o, _)| *o == c) else {
                    return false;
                };
                self.other[i].1 -= 1;
                if self.other[i].1 == 0 {
                    self.other.remove(i);
                }
            }
        }
        self.total -= 1;
        true
    }

    pub fn count(&self, c: char) -> usize {
        match rank(c) {
            Some(r) => self.known[r] as usize,
            None => self
                .other
                .iter()
                .find(|(o, _)| *o == c)
                .map_or(0, |(_, n)| *n as usize),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of symbols in `need` that `self` cannot supply.
    pub fn shortfall(&self, need: &LetterCounts) -> usize {
        let mut missing = 0;
        for (have, want) in self.known.iter().zip(need.known.iter()) {
            missing += want.saturating_sub(*have) as usize;
        }
        for (c, want) in &need.other {
            missing += (*want as usize).saturating_sub(self.count(*c));
        }
        missing
    }

    /// `self` minus `other`, clamped at zero per symbol.
    pub fn saturating_sub(&self, other: &LetterCounts) -> LetterCounts {
        let mut out = LetterCounts::new();
        for (r, (a, b)) in self.known.iter().zip(other.known.iter()).enumerate() {
            let n = a.saturating_sub(*b);
            out.known[r] = n;
            out.total += n as usize;
        }
        for (c, a) in &self.other {
            let n = (*a as usize).saturating_sub(other.count(*c));
            if n > 0 {
                out.other.push((*c, n as u16));
                out.total += n;
            }
        }
        out
    }

    /// Distinct symbols with their multiplicity, in collation order.
    pub fn distinct(&self) -> impl Iterator<Item = (char, usize)> + '_ {
        COLLATION
            .iter()
            .zip(self.known.iter())
            .filter(|(_, n)| **n > 0)
            .map(|(c, n)| (*c, *n as usize))
            .chain(self.other.iter().map(|(c, n)| (*c, *n as usize)))
    }

    pub fn alphagram(&self) -> Alphagram {
        let mut s = String::with_capacity(self.total * 2);
        for (c, n) in self.distinct() {
            for _ in 0..n {
                s.push(c);
            }
        }
        Alphagram(s)
    }
}
