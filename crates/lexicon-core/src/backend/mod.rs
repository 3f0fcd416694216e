//! Query backends.
//!
//! A backend answers three lookup shapes: membership, all words of a length,
//! and an alphagram bucket. The orchestrator only depends on this trait, so
//! an on-device database, a network service and the in-memory index are
//! interchangeable tiers. [`IndexBackend`] is the in-crate variant; database
//! tiers are supplied by the embedding application.

pub mod scan;

use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;

use crate::alphabet::{Alphagram, NormalizedWord};
use crate::index::{LexiconIndex, WordEntry};

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Memory,
    Local,
    Remote,
}

impl Tier {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Tier::Memory => 1,
            Tier::Local => 2,
            Tier::Remote => 3,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Option<Tier> {
        match v {
            1 => Some(Tier::Memory),
            2 => Some(Tier::Local),
            3 => Some(Tier::Remote),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::Memory => "memory",
            Tier::Local => "local",
            Tier::Remote => "remote",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("tier unavailable: {0}")]
    Unavailable(String),

    #[error("tier timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait QueryBackend: Send + Sync {
    fn tier(&self) -> Tier;

    async fn contains(&self, word: &NormalizedWord) -> Result<bool, BackendError>;

    /// Every word with `len` symbols, in both spellings.
    async fn words_by_length(&self, len: usize) -> Result<Vec<WordEntry>, BackendError>;

    /// Display words whose alphagram is `alphagram`.
    async fn words_by_alphagram(&self, alphagram: &Alphagram) -> Result<Vec<String>, BackendError>;

    /// A tier is usable only if it answers with data. The default checks
    /// that a well-known bucket is non-empty.
    async fn probe(&self, alphagram: &Alphagram) -> Result<bool, BackendError> {
        Ok(!self.words_by_alphagram(alphagram).await?.is_empty())
    }
}

/// A ready index served through the backend trait, e.g. one opened from a
/// file on local disk.
pub struct IndexBackend {
    index: Arc<LexiconIndex>,
    tier: Tier,
}

impl IndexBackend {
    pub fn new(index: Arc<LexiconIndex>, tier: Tier) -> Self {
        Self { index, tier }
    }

    pub fn index(&self) -> &Arc<LexiconIndex> {
        &self.index
    }
}

#[async_trait]
impl QueryBackend for IndexBackend {
    fn tier(&self) -> Tier {
        self.tier
    }

    async fn contains(&self, word: &NormalizedWord) -> Result<bool, BackendError> {
        Ok(self.index.contains(word))
    }

    async fn words_by_length(&self, len: usize) -> Result<Vec<WordEntry>, BackendError> {
        Ok(self.index.entries_of_length(len))
    }

    async fn words_by_alphagram(&self, alphagram: &Alphagram) -> Result<Vec<String>, BackendError> {
        Ok(self.index.anagram_bucket(alphagram.len(), alphagram).to_vec())
    }
}
