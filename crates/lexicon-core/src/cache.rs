//! Bounded result cache shared by all query paths.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use lru::LruCache;

use crate::backend::Tier;

/// LRU cache keyed by the answering tier and the canonical query text.
/// A capacity of zero disables caching entirely.
pub struct QueryCache<V> {
    inner: Option<Mutex<LruCache<(Tier, String), V>>>,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn get(&self, tier: Tier, key: &str) -> Option<V> {
        let inner = self.inner.as_ref()?;
        let mut cache = inner.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(&(tier, key.to_string())).cloned()
    }

    pub fn put(&self, tier: Tier, key: String, value: V) {
        if let Some(inner) = &self.inner {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .put((tier, key), value);
        }
    }

    /// Drop every entry. Called whenever the answering data changes.
    pub fn clear(&self) {
        if let Some(inner) = &self.inner {
            inner.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.lock().unwrap_or_else(PoisonError::into_inner).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_per_tier() {
        let cache = QueryCache::new(4);
        cache.put(Tier::Memory, "anagram:AMOR".into(), 1);
        assert_eq!(cache.get(Tier::Memory, "anagram:AMOR"), Some(1));
        assert_eq!(cache.get(Tier::Local, "anagram:AMOR"), None);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = QueryCache::new(2);
        cache.put(Tier::Memory, "a".into(), 1);
        cache.put(Tier::Memory, "b".into(), 2);
        assert_eq!(cache.get(Tier::Memory, "a"), Some(1));
        cache.put(Tier::Memory, "c".into(), 3);
        assert_eq!(cache.get(Tier::Memory, "b"), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_disables() {
        let cache = QueryCache::new(0);
        assert!(!cache.is_enabled());
        cache.put(Tier::Remote, "x".into(), 1);
        assert_eq!(cache.get(Tier::Remote, "x"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_empties() {
        let cache = QueryCache::new(8);
        cache.put(Tier::Local, "x".into(), "v".to_string());
        cache.clear();
        assert!(cache.is_empty());
    }
}
