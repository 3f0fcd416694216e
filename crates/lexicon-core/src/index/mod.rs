//! In-memory lexicon index.
//!
//! `LexiconIndex` pairs a symbol trie (exact and prefix lookups) with a
//! `(length, alphagram)` table whose buckets hold every display word sharing
//! that alphagram. Both structures are built together by `insert` and are
//! never mutated once the index is handed to readers.

mod io;

pub use io::{peek_version, HEADER_SIZE, INDEX_FORMAT_VERSION, MAGIC};

use std::collections::{BTreeMap, HashMap};
use std::io as std_io;

use crate::alphabet::{self, Alphagram, NormalizedWord};

/// Errors from reading or writing serialized indexes.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std_io::Error),

    #[error("invalid header (too short)")]
    InvalidHeader,

    #[error("invalid magic bytes (expected LXIX)")]
    InvalidMagic,

    #[error("unsupported index format version: {0}")]
    UnsupportedVersion(u8),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("serialization error: {0}")]
    Serialize(bincode::Error),

    #[error("deserialization error: {0}")]
    Deserialize(bincode::Error),

    #[error("corrupt index: {0}")]
    Corrupt(String),
}

impl IndexError {
    /// Errors that mean a stored blob should be discarded and rebuilt.
    pub fn is_stale(&self) -> bool {
        !matches!(self, IndexError::Io(_) | IndexError::Serialize(_))
    }
}

/// A lexicon word in its internal and display spellings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WordEntry {
    pub normalized: NormalizedWord,
    pub display: String,
}

impl WordEntry {
    /// Normalize raw text; the display form is the digraph-expanded spelling.
    pub fn from_raw(text: &str) -> Self {
        let normalized = alphabet::normalize(text.trim());
        let display = normalized.to_display();
        Self {
            normalized,
            display,
        }
    }
}

/// One trie node. Terminal nodes carry the display form of their word.
#[derive(Debug, Default)]
pub struct TrieNode {
    children: BTreeMap<char, TrieNode>,
    word: Option<String>,
}

impl TrieNode {
    pub fn child(&self, symbol: char) -> Option<&TrieNode> {
        self.children.get(&symbol)
    }

    pub fn children(&self) -> impl Iterator<Item = (char, &TrieNode)> {
        self.children.iter().map(|(c, n)| (*c, n))
    }

    pub fn is_terminal(&self) -> bool {
        self.word.is_some()
    }

    pub fn word(&self) -> Option<&str> {
        self.word.as_deref()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

// Unlinks descendants onto a heap stack so very deep chains cannot overflow
// the call stack on drop.
impl Drop for TrieNode {
    fn drop(&mut self) {
        let mut stack: Vec<TrieNode> = std::mem::take(&mut self.children).into_values().collect();
        while let Some(mut node) = stack.pop() {
            stack.extend(std::mem::take(&mut node.children).into_values());
        }
    }
}

type Buckets = HashMap<Alphagram, Vec<String>>;

#[derive(Debug, Default)]
pub struct LexiconIndex {
    root: TrieNode,
    by_length: HashMap<usize, Buckets>,
    word_count: usize,
    node_count: usize,
}

impl LexiconIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::new();
        for w in words {
            index.insert(w.as_ref());
        }
        index
    }

    /// Insert raw text. The display form is the normalized word with its
    /// digraphs expanded. Returns false for duplicates and empty input.
    pub fn insert(&mut self, word: &str) -> bool {
        let entry = WordEntry::from_raw(word);
        self.insert_entry(&entry)
    }

    pub fn insert_entry(&mut self, entry: &WordEntry) -> bool {
        self.insert_normalized(&entry.normalized, &entry.display)
    }

    /// Insert an already-normalized word with an explicit display form.
    pub fn insert_normalized(&mut self, word: &NormalizedWord, display: &str) -> bool {
        if word.is_empty() {
            return false;
        }
        let mut node = &mut self.root;
        let mut created = 0;
        for c in word.symbols() {
            node = node.children.entry(c).or_insert_with(|| {
                created += 1;
                TrieNode::default()
            });
        }
        self.node_count += created;
        if node.word.is_some() {
            return false;
        }
        node.word = Some(display.to_string());
        self.register(word, display);
        true
    }

    fn register(&mut self, word: &NormalizedWord, display: &str) {
        let bucket = self
            .by_length
            .entry(word.len())
            .or_default()
            .entry(word.alphagram())
            .or_default();
        if !bucket.iter().any(|w| w == display) {
            bucket.push(display.to_string());
        }
        self.word_count += 1;
    }

    pub fn root(&self) -> &TrieNode {
        &self.root
    }

    /// Follow `word` from the root.
    pub fn node(&self, word: &NormalizedWord) -> Option<&TrieNode> {
        word.symbols()
            .try_fold(&self.root, |node, c| node.children.get(&c))
    }

    /// Exact membership for raw text.
    pub fn search(&self, text: &str) -> bool {
        self.contains(&alphabet::normalize(text.trim()))
    }

    pub fn contains(&self, word: &NormalizedWord) -> bool {
        self.node(word).is_some_and(TrieNode::is_terminal)
    }

    pub fn display_of(&self, word: &NormalizedWord) -> Option<&str> {
        self.node(word).and_then(TrieNode::word)
    }

    /// Every display word under `prefix`, in trie order.
    pub fn words_with_prefix(&self, prefix: &str) -> Vec<String> {
        let prefix = alphabet::normalize(prefix.trim());
        let mut out = Vec::new();
        if let Some(node) = self.node(&prefix) {
            collect_words(node, &mut out);
        }
        out
    }

    /// Full enumeration. Callers scanning repeatedly should keep the result.
    pub fn all_words(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.word_count);
        collect_words(&self.root, &mut out);
        out
    }

    /// Normalized and display forms of every word with `len` symbols.
    pub fn entries_of_length(&self, len: usize) -> Vec<WordEntry> {
        let mut out = Vec::new();
        if len == 0 || !self.by_length.contains_key(&len) {
            return out;
        }
        let mut stack: Vec<(&TrieNode, String, usize)> = vec![(&self.root, String::new(), 0)];
        while let Some((node, path, depth)) = stack.pop() {
            if depth == len {
                if let Some(w) = &node.word {
                    out.push(WordEntry {
                        normalized: NormalizedWord::from_symbols(path.chars()),
                        display: w.clone(),
                    });
                }
                continue;
            }
            for (c, child) in node.children.iter().rev() {
                let mut next = path.clone();
                next.push(*c);
                stack.push((child, next, depth + 1));
            }
        }
        out
    }

    /// Display words sharing `alphagram` at `len` symbols.
    pub fn anagram_bucket(&self, len: usize, alphagram: &Alphagram) -> &[String] {
        self.by_length
            .get(&len)
            .and_then(|buckets| buckets.get(alphagram))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn anagrams_of(&self, word: &NormalizedWord) -> &[String] {
        self.anagram_bucket(word.len(), &word.alphagram())
    }

    /// `(alphagram, words)` buckets for one length, in no particular order.
    pub fn buckets_of_length(&self, len: usize) -> impl Iterator<Item = (&Alphagram, &[String])> {
        self.by_length
            .get(&len)
            .into_iter()
            .flat_map(|buckets| buckets.iter().map(|(a, w)| (a, w.as_slice())))
    }

    pub fn bucket_count(&self, len: usize) -> usize {
        self.by_length.get(&len).map_or(0, HashMap::len)
    }

    pub fn words_of_length(&self, len: usize) -> Vec<String> {
        self.buckets_of_length(len)
            .flat_map(|(_, words)| words.iter().cloned())
            .collect()
    }

    pub fn lengths(&self) -> Vec<usize> {
        let mut lens: Vec<usize> = self.by_length.keys().copied().collect();
        lens.sort_unstable();
        lens
    }

    pub fn max_length(&self) -> usize {
        self.by_length.keys().copied().max().unwrap_or(0)
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn is_empty(&self) -> bool {
        self.word_count == 0
    }
}

fn collect_words(start: &TrieNode, out: &mut Vec<String>) {
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if let Some(w) = &node.word {
            out.push(w.clone());
        }
        stack.extend(node.children.values().rev());
    }
}
