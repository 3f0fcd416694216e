//! Persistence slots for serialized indexes and bulk word sources.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::index::{IndexError, LexiconIndex, WordEntry};

/// A single slot holding at most one serialized index. The format version
/// travels in the blob header; a mismatch surfaces as
/// `IndexError::UnsupportedVersion` from `load`.
pub trait IndexStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<LexiconIndex>, IndexError>;
    fn store(&self, index: &LexiconIndex) -> Result<(), IndexError>;
    fn clear(&self) -> Result<(), IndexError>;
}

/// Index file on disk, written atomically and read through mmap.
pub struct FileIndexStore {
    path: PathBuf,
}

impl FileIndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IndexStore for FileIndexStore {
    fn load(&self) -> Result<Option<LexiconIndex>, IndexError> {
        match LexiconIndex::open(&self.path) {
            Ok(index) => Ok(Some(index)),
            Err(IndexError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store(&self, index: &LexiconIndex) -> Result<(), IndexError> {
        index.save(&self.path)
    }

    fn clear(&self) -> Result<(), IndexError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process slot holding the serialized bytes.
#[derive(Default)]
pub struct MemoryIndexStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the slot with raw bytes, e.g. a blob from an older format.
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Mutex::new(Some(bytes)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl IndexStore for MemoryIndexStore {
    fn load(&self) -> Result<Option<LexiconIndex>, IndexError> {
        let slot = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_deref().map(LexiconIndex::from_bytes).transpose()
    }

    fn store(&self, index: &LexiconIndex) -> Result<(), IndexError> {
        let bytes = index.to_bytes()?;
        *self.bytes.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
        Ok(())
    }

    fn clear(&self) -> Result<(), IndexError> {
        *self.bytes.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("{path}:{line}: {reason}")]
    Parse {
        path: String,
        line: usize,
        reason: String,
    },
    #[error("word source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the complete word list for an index build.
#[async_trait]
pub trait WordSource: Send + Sync {
    async fn load_words(&self) -> Result<Vec<WordEntry>, SourceError>;
}

/// UTF-8 word list, one entry per line: `WORD` or `NORMALIZED;DISPLAY`.
/// Blank lines and `#` comments are skipped.
pub struct FileWordSource {
    path: PathBuf,
}

impl FileWordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub fn parse_word_list(content: &str, origin: &str) -> Result<Vec<WordEntry>, SourceError> {
    let mut entries = Vec::new();
    for (i, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let entry = match line.split_once(';') {
            Some((normalized, display)) => {
                let normalized = crate::alphabet::normalize(normalized.trim());
                let display = display.trim();
                if normalized.is_empty() || display.is_empty() {
                    return Err(SourceError::Parse {
                        path: origin.to_string(),
                        line: i + 1,
                        reason: "expected NORMALIZED;DISPLAY".to_string(),
                    });
                }
                WordEntry {
                    normalized,
                    display: display.to_string(),
                }
            }
            None => WordEntry::from_raw(line),
        };
        entries.push(entry);
    }
    Ok(entries)
}

#[async_trait]
impl WordSource for FileWordSource {
    async fn load_words(&self) -> Result<Vec<WordEntry>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        parse_word_list(&content, &self.path.display().to_string())
    }
}

/// A fixed in-memory list.
pub struct StaticWordSource {
    entries: Vec<WordEntry>,
}

impl StaticWordSource {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: words
                .into_iter()
                .map(|w| WordEntry::from_raw(w.as_ref()))
                .collect(),
        }
    }
}

#[async_trait]
impl WordSource for StaticWordSource {
    async fn load_words(&self) -> Result<Vec<WordEntry>, SourceError> {
        Ok(self.entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LexiconIndex {
        LexiconIndex::from_words(["casa", "choza", "perro"])
    }

    #[test]
    fn file_store_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIndexStore::new(dir.path().join("lexicon.lxix"));
        assert!(store.load().unwrap().is_none());
        store.store(&sample()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert!(loaded.search("choza"));
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn memory_store_reports_version_mismatch() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[4] = crate::index::INDEX_FORMAT_VERSION + 1;
        let store = MemoryIndexStore::with_bytes(bytes);
        let err = store.load().unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedVersion(_)));
        assert!(err.is_stale());
        store.clear().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn parse_word_list_formats() {
        let entries = parse_word_list("# comment\ncasa\n\n ÇOZA ; CHOZA \ncamión;CAMIÓN\n", "test").unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].display, "CASA");
        assert_eq!(entries[1].normalized.as_str(), "ÇOZA");
        assert_eq!(entries[1].display, "CHOZA");
        assert_eq!(entries[2].normalized.as_str(), "CAMION");
        assert_eq!(entries[2].display, "CAMIÓN");
    }

    #[test]
    fn parse_word_list_rejects_half_entries() {
        let err = parse_word_list("casa\n;CASA\n", "words.txt").unwrap_err();
        assert_eq!(err.to_string(), "words.txt:2: expected NORMALIZED;DISPLAY");
    }

    #[tokio::test]
    async fn file_word_source_reads_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.txt");
        std::fs::write(&path, "perro\ncalle\n").unwrap();
        let words = FileWordSource::new(&path).load_words().await.unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[1].normalized.as_str(), "CAĿE");
    }
}
