use std::collections::HashMap;
use std::fs::{self, File};
use std::path::Path;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use super::{IndexError, LexiconIndex, TrieNode};
use crate::alphabet::NormalizedWord;

pub const MAGIC: &[u8; 4] = b"LXIX";
/// Bumped whenever the node layout changes; older blobs are discarded.
pub const INDEX_FORMAT_VERSION: u8 = 1;
// magic(4) + version(1) + reserved(3) + crc32(4) + body_len(4)
pub const HEADER_SIZE: usize = 16;

/// Pre-order node record. `children` records follow, depth-first.
#[derive(Serialize, Deserialize)]
struct NodeRecord {
    symbol: char,
    children: u32,
    word: Option<String>,
}

/// Read the format version of a serialized index without decoding it.
pub fn peek_version(data: &[u8]) -> Result<u8, IndexError> {
    if data.len() < 5 {
        return Err(IndexError::InvalidHeader);
    }
    if &data[..4] != MAGIC {
        return Err(IndexError::InvalidMagic);
    }
    Ok(data[4])
}

impl LexiconIndex {
    /// Serialize to bytes (LXIX format).
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        let mut records = Vec::with_capacity(self.node_count + 1);
        let mut stack = vec![('\0', &self.root)];
        while let Some((symbol, node)) = stack.pop() {
            let children: u32 = node
                .children
                .len()
                .try_into()
                .map_err(|_| IndexError::Corrupt("node fan-out exceeds u32::MAX".into()))?;
            records.push(NodeRecord {
                symbol,
                children,
                word: node.word.clone(),
            });
            stack.extend(node.children.iter().rev().map(|(c, n)| (*c, n)));
        }

        let body = bincode::serialize(&records).map_err(IndexError::Serialize)?;
        let body_len: u32 = body
            .len()
            .try_into()
            .map_err(|_| IndexError::Corrupt("index body exceeds u32::MAX".into()))?;

        let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
        buf.extend_from_slice(MAGIC);
        buf.push(INDEX_FORMAT_VERSION);
        buf.extend_from_slice(&[0u8; 3]); // reserved
        buf.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Deserialize from bytes (LXIX format). The length table is rebuilt from
    /// the terminal nodes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, IndexError> {
        let version = peek_version(data)?;
        if version != INDEX_FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion(version));
        }
        if data.len() < HEADER_SIZE {
            return Err(IndexError::InvalidHeader);
        }
        let crc = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
        let body_len = u32::from_le_bytes([data[12], data[13], data[14], data[15]]) as usize;
        let body = data
            .get(HEADER_SIZE..HEADER_SIZE + body_len)
            .ok_or(IndexError::InvalidHeader)?;
        if crc32fast::hash(body) != crc {
            return Err(IndexError::ChecksumMismatch);
        }

        let records: Vec<NodeRecord> =
            bincode::deserialize(body).map_err(IndexError::Deserialize)?;
        rebuild(records)
    }

    /// Atomic write: write to .tmp then rename.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Open a serialized index, reading it through a memory map.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let file = File::open(path)?;
        // SAFETY: The file is opened read-only and the mapping is immutable.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&mmap)
    }
}

struct Pending {
    symbol: char,
    node: TrieNode,
    remaining: u32,
}

fn rebuild(records: Vec<NodeRecord>) -> Result<LexiconIndex, IndexError> {
    let mut records = records.into_iter();
    let root = records
        .next()
        .ok_or_else(|| IndexError::Corrupt("empty node list".into()))?;
    if root.word.is_some() {
        return Err(IndexError::Corrupt("root node is terminal".into()));
    }

    let mut index = LexiconIndex {
        root: TrieNode::default(),
        by_length: HashMap::new(),
        word_count: 0,
        node_count: 0,
    };
    let mut terminals: Vec<(NormalizedWord, String)> = Vec::new();
    let mut path = String::new();
    let mut stack = vec![Pending {
        symbol: root.symbol,
        node: TrieNode::default(),
        remaining: root.children,
    }];

    loop {
        // Attach every finished subtree to its parent.
        while stack.len() > 1 && stack.last().is_some_and(|p| p.remaining == 0) {
            let done = stack.pop().ok_or_else(|| IndexError::Corrupt("stack underflow".into()))?;
            path.pop();
            let parent = stack
                .last_mut()
                .ok_or_else(|| IndexError::Corrupt("stack underflow".into()))?;
            if parent.node.children.insert(done.symbol, done.node).is_some() {
                return Err(IndexError::Corrupt(format!(
                    "duplicate child symbol {:?}",
                    done.symbol
                )));
            }
        }
        if stack.len() == 1 && stack[0].remaining == 0 {
            break;
        }

        let rec = records
            .next()
            .ok_or_else(|| IndexError::Corrupt("truncated node list".into()))?;
        if let Some(top) = stack.last_mut() {
            top.remaining -= 1;
        }
        path.push(rec.symbol);
        index.node_count += 1;
        if let Some(display) = &rec.word {
            terminals.push((NormalizedWord::from_symbols(path.chars()), display.clone()));
        }
        stack.push(Pending {
            symbol: rec.symbol,
            node: TrieNode {
                children: Default::default(),
                word: rec.word,
            },
            remaining: rec.children,
        });
    }

    if records.next().is_some() {
        return Err(IndexError::Corrupt("trailing node records".into()));
    }
    if let Some(root) = stack.pop() {
        index.root = root.node;
    }
    for (word, display) in terminals {
        index.register(&word, &display);
    }
    Ok(index)
}
