use std::fmt;

use super::QueryError;
use crate::alphabet::{self, LetterCounts, JOKER};

/// Hard ceiling on jokers per rack. Joker fan-out grows with the alphabet
/// size raised to this power.
pub const SUPPORTED_MAX_WILDCARDS: u8 = 2;

/// A player's tiles: a multiset of letters plus a joker count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RackSpec {
    letters: LetterCounts,
    jokers: u8,
    explicit_length: Option<usize>,
}

impl RackSpec {
    /// Parse rack text. Pattern punctuation and whitespace are ignored, `?`
    /// counts as a joker, and a trailing `:N` is kept as an explicit length.
    /// Anything else must normalize to a letter of the alphabet.
    pub fn parse(text: &str, max_wildcards: u8) -> Result<Self, QueryError> {
        if max_wildcards > SUPPORTED_MAX_WILDCARDS {
            return Err(QueryError::UnsupportedWildcardLimit(max_wildcards));
        }
        let (body, explicit_length) = split_length_suffix(text)?;

        let mut jokers = 0usize;
        let mut letters = String::with_capacity(body.len());
        for c in body.chars() {
            match c {
                JOKER => jokers += 1,
                '.' | '*' | '-' | ',' | '^' | '$' => {}
                c if c.is_whitespace() => {}
                c => letters.push(c),
            }
        }
        if jokers > max_wildcards as usize {
            return Err(QueryError::TooManyWildcards {
                found: jokers,
                max: max_wildcards,
            });
        }

        let letters = alphabet::normalize(&letters);
        if let Some(c) = letters.symbols().find(|&c| !alphabet::is_symbol(c)) {
            return Err(QueryError::InvalidRack(format!(
                "unexpected character {c:?} in {text:?}"
            )));
        }

        Ok(Self {
            letters: letters.counts(),
            jokers: jokers as u8,
            explicit_length,
        })
    }

    pub fn from_parts(letters: LetterCounts, jokers: u8) -> Self {
        Self {
            letters,
            jokers,
            explicit_length: None,
        }
    }

    pub fn letters(&self) -> &LetterCounts {
        &self.letters
    }

    pub fn jokers(&self) -> usize {
        self.jokers as usize
    }

    /// Tile count, jokers included.
    pub fn len(&self) -> usize {
        self.letters.total() + self.jokers as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn explicit_length(&self) -> Option<usize> {
        self.explicit_length
    }

    /// Whether the rack can pay for `need`, using jokers for any shortfall.
    pub fn covers(&self, need: &LetterCounts) -> bool {
        need.total() <= self.len() && self.letters.shortfall(need) <= self.jokers as usize
    }
}

impl fmt::Display for RackSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letters.alphagram().as_str())?;
        for _ in 0..self.jokers {
            f.write_str("?")?;
        }
        Ok(())
    }
}

/// Split `TEXT:N` into `TEXT` and `N`.
pub(crate) fn split_length_suffix(text: &str) -> Result<(&str, Option<usize>), QueryError> {
    let Some((body, len)) = text.rsplit_once(':') else {
        return Ok((text, None));
    };
    let len = len.trim();
    let n: usize = len
        .parse()
        .map_err(|_| QueryError::InvalidLength(len.to_string()))?;
    if n == 0 {
        return Err(QueryError::InvalidLength(len.to_string()));
    }
    Ok((body, Some(n)))
}
