//! Tiered query front end.
//!
//! Queries go to the in-memory index when one is installed, otherwise to the
//! local backend if it passes a short availability probe, otherwise to the
//! remote backend if `connect` confirmed it. When nothing answers the result
//! is empty; only malformed requests produce errors.
//!
//! The primary index is swapped in whole by [`TieredLexicon::upgrade`]. A
//! query reads the slot once, so it runs entirely against one tier.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::alphabet::{self, NormalizedWord};
use crate::backend::{scan, BackendError, QueryBackend, Tier};
use crate::builder::{BuildError, BuildEvent, BuildHandle, BuildProgress, BuildStatus, IndexBuilder};
use crate::cache::QueryCache;
use crate::index::{LexiconIndex, WordEntry};
use crate::query::{self, LengthFilter, PatternQuery, QueryError, RackSpec, WildcardMatches};
use crate::settings::Settings;
use crate::store::{IndexStore, WordSource};

/// Latest state of the index build, as seen by subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSnapshot {
    pub status: BuildStatus,
    pub progress: Option<BuildProgress>,
    pub error: Option<String>,
}

/// Outcome of [`TieredLexicon::enable_fast_mode`].
#[derive(Debug)]
pub enum FastMode {
    /// A primary index was already installed.
    AlreadyReady,
    /// The cached index was loaded and installed.
    Loaded,
    /// A fresh build is running; the handle resolves when it ends.
    Building(JoinHandle<Result<(), BuildError>>),
}

enum Request {
    Search(NormalizedWord),
    Anagrams(NormalizedWord),
    Wildcards(RackSpec),
    SubAnagrams(RackSpec, usize),
    Pattern(PatternQuery, LengthFilter),
}

#[derive(Debug, Clone)]
enum Answer {
    Found(bool),
    Words(Vec<String>),
    Wildcards(WildcardMatches),
}

impl Answer {
    fn found(self) -> bool {
        matches!(self, Answer::Found(true))
    }

    fn words(self) -> Vec<String> {
        match self {
            Answer::Words(words) => words,
            _ => Vec::new(),
        }
    }

    fn wildcards(self) -> WildcardMatches {
        match self {
            Answer::Wildcards(m) => m,
            _ => WildcardMatches::default(),
        }
    }
}

impl Request {
    fn cache_key(&self) -> String {
        match self {
            Request::Search(word) => format!("search:{word}"),
            Request::Anagrams(word) => format!("anagram:{}", word.alphagram()),
            Request::Wildcards(rack) => format!("wildcard:{rack}"),
            Request::SubAnagrams(rack, min) => format!("sub:{rack}:{min}"),
            Request::Pattern(q, filter) => format!(
                "pattern:{}|{}|{:?}|{}|{}|{:?}|{}",
                q.pattern,
                q.rack.as_ref().map(ToString::to_string).unwrap_or_default(),
                q.length,
                filter.show_longer,
                filter.default_max_length,
                filter.explicit_length,
                filter.max_word_length,
            ),
        }
    }

    fn empty_answer(&self) -> Answer {
        match self {
            Request::Search(_) => Answer::Found(false),
            Request::Wildcards(_) => Answer::Wildcards(WildcardMatches::default()),
            _ => Answer::Words(Vec::new()),
        }
    }

    fn answer_from_index(&self, index: &LexiconIndex) -> Answer {
        match self {
            Request::Search(word) => Answer::Found(index.contains(word)),
            Request::Anagrams(word) => {
                let mut words = index.anagrams_of(word).to_vec();
                words.sort();
                Answer::Words(words)
            }
            Request::Wildcards(rack) => Answer::Wildcards(query::wildcard_matches(index, rack)),
            Request::SubAnagrams(rack, min) => Answer::Words(query::sub_anagrams(index, rack, *min)),
            Request::Pattern(q, filter) => Answer::Words(query::find_pattern_matches(index, q, filter)),
        }
    }

    async fn answer_from_backend(&self, backend: &dyn QueryBackend) -> Result<Answer, BackendError> {
        Ok(match self {
            Request::Search(word) => Answer::Found(scan::search(backend, word).await?),
            Request::Anagrams(word) => Answer::Words(scan::find_anagrams(backend, word).await?),
            Request::Wildcards(rack) => Answer::Wildcards(scan::wildcard_matches(backend, rack).await?),
            Request::SubAnagrams(rack, min) => Answer::Words(scan::sub_anagrams(backend, rack, *min).await?),
            Request::Pattern(q, filter) => match filter.window(q) {
                Some(window) => Answer::Words(scan::pattern_matches(backend, q, window).await?),
                None => Answer::Words(Vec::new()),
            },
        })
    }
}

#[derive(Clone)]
struct Primary {
    index: Arc<LexiconIndex>,
    generation: u64,
}

pub struct TieredLexicon {
    settings: Settings,
    primary: RwLock<Option<Primary>>,
    local: Option<Arc<dyn QueryBackend>>,
    remote: Option<Arc<dyn QueryBackend>>,
    remote_available: AtomicBool,
    last_tier: AtomicU8,
    cache: QueryCache<Answer>,
    status: watch::Sender<BuildSnapshot>,
    build_cancel: Mutex<Option<Arc<AtomicBool>>>,
}

impl TieredLexicon {
    pub fn new(settings: Settings) -> Self {
        let (status, _) = watch::channel(BuildSnapshot::default());
        Self {
            cache: QueryCache::new(settings.cache.capacity),
            settings,
            primary: RwLock::new(None),
            local: None,
            remote: None,
            remote_available: AtomicBool::new(false),
            last_tier: AtomicU8::new(0),
            status,
            build_cancel: Mutex::new(None),
        }
    }

    pub fn with_local(mut self, backend: Arc<dyn QueryBackend>) -> Self {
        self.local = Some(backend);
        self
    }

    pub fn with_remote(mut self, backend: Arc<dyn QueryBackend>) -> Self {
        self.remote = Some(backend);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // -- tiers ---------------------------------------------------------------

    /// Probe the remote tier and remember whether it may be used. A failed
    /// remote query clears the flag again.
    pub async fn connect(&self) -> bool {
        let Some(remote) = &self.remote else {
            return false;
        };
        let ok = self
            .probe(remote.as_ref(), self.settings.tiers.remote_probe_timeout())
            .await;
        self.remote_available.store(ok, Ordering::Release);
        info!(available = ok, "remote tier probed");
        ok
    }

    pub fn primary(&self) -> Option<Arc<LexiconIndex>> {
        self.current_primary().map(|p| p.index)
    }

    fn current_primary(&self) -> Option<Primary> {
        self.primary
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install `index` as the primary tier. Queries that already read the
    /// previous state finish against it; every later query sees `index`.
    pub fn upgrade(&self, index: Arc<LexiconIndex>) {
        let words = index.word_count();
        {
            let mut slot = self.primary.write().unwrap_or_else(PoisonError::into_inner);
            let generation = slot.as_ref().map_or(1, |p| p.generation + 1);
            *slot = Some(Primary { index, generation });
        }
        self.cache.clear();
        self.status.send_modify(|s| {
            s.status = BuildStatus::Ready;
            s.error = None;
        });
        info!(words, "primary tier installed");
    }

    /// The tier that answered the most recent query. Diagnostic only.
    pub fn last_tier(&self) -> Option<Tier> {
        Tier::from_u8(self.last_tier.load(Ordering::Relaxed))
    }

    fn note_tier(&self, tier: Option<Tier>) {
        self.last_tier
            .store(tier.map_or(0, Tier::to_u8), Ordering::Relaxed);
    }

    async fn probe(&self, backend: &dyn QueryBackend, limit: Duration) -> bool {
        let probe = alphabet::alphagram(&self.settings.tiers.probe_letters);
        let tier = backend.tier();
        match tokio::time::timeout(limit, backend.probe(&probe)).await {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                debug!(%tier, "tier has no data yet");
                false
            }
            Ok(Err(e)) => {
                warn!(%tier, error = %e, "tier probe failed");
                false
            }
            Err(_) => {
                debug!(%tier, ?limit, "tier probe timed out");
                false
            }
        }
    }

    /// Secondary tiers may still be filling in, so their answers are never
    /// cached.
    async fn ask(&self, backend: &dyn QueryBackend, request: &Request) -> Result<Answer, BackendError> {
        let answer = tokio::time::timeout(
            self.settings.tiers.query_timeout(),
            request.answer_from_backend(backend),
        )
        .await
        .map_err(|_| BackendError::Timeout)??;
        self.note_tier(Some(backend.tier()));
        Ok(answer)
    }

    async fn route(&self, request: Request) -> Answer {
        let key = request.cache_key();

        if let Some(primary) = self.current_primary() {
            let key = format!("{}/{key}", primary.generation);
            self.note_tier(Some(Tier::Memory));
            if let Some(hit) = self.cache.get(Tier::Memory, &key) {
                return hit;
            }
            let answer = request.answer_from_index(&primary.index);
            self.cache.put(Tier::Memory, key, answer.clone());
            return answer;
        }

        if let Some(local) = &self.local {
            if self.probe(local.as_ref(), self.settings.tiers.probe_timeout()).await {
                match self.ask(local.as_ref(), &request).await {
                    Ok(answer) => return answer,
                    Err(e) => warn!(tier = %Tier::Local, error = %e, "tier query failed"),
                }
            }
        }

        if let Some(remote) = &self.remote {
            if self.remote_available.load(Ordering::Acquire) {
                match self.ask(remote.as_ref(), &request).await {
                    Ok(answer) => return answer,
                    Err(e) => {
                        // Stays off until `connect` confirms it again.
                        self.remote_available.store(false, Ordering::Release);
                        warn!(tier = %Tier::Remote, error = %e, "tier query failed; remote disabled");
                    }
                }
            }
        }

        debug!(%key, "no tier answered");
        self.note_tier(None);
        request.empty_answer()
    }

    // -- queries -------------------------------------------------------------

    pub async fn search(&self, text: &str) -> bool {
        let word = alphabet::normalize(text.trim());
        if word.is_empty() {
            return false;
        }
        self.route(Request::Search(word)).await.found()
    }

    pub async fn find_anagrams(&self, text: &str) -> Vec<String> {
        let word = alphabet::normalize(text.trim());
        if word.is_empty() {
            return Vec::new();
        }
        self.route(Request::Anagrams(word)).await.words()
    }

    pub async fn find_anagrams_with_wildcards(
        &self,
        text: &str,
        max_wildcards: u8,
    ) -> Result<WildcardMatches, QueryError> {
        let rack = RackSpec::parse(text, max_wildcards)?;
        if rack.is_empty() {
            return Ok(WildcardMatches::default());
        }
        Ok(self.route(Request::Wildcards(rack)).await.wildcards())
    }

    pub async fn find_sub_anagrams(&self, text: &str, min_length: usize) -> Result<Vec<String>, QueryError> {
        let rack = RackSpec::parse(text, self.settings.query.max_wildcards)?;
        if rack.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .route(Request::SubAnagrams(rack, min_length.max(1)))
            .await
            .words())
    }

    /// `query` is `PATTERN[:N][,RACK]`.
    pub async fn find_pattern_matches(
        &self,
        query: &str,
        show_longer: bool,
        default_max_length: usize,
        explicit_length: Option<usize>,
    ) -> Result<Vec<String>, QueryError> {
        if explicit_length == Some(0) {
            return Err(QueryError::InvalidLength("0".to_string()));
        }
        let query = PatternQuery::parse(query, self.settings.query.max_wildcards)?;
        let filter = LengthFilter {
            show_longer,
            default_max_length,
            explicit_length,
            max_word_length: self.settings.query.max_word_length.max(default_max_length),
        };
        Ok(self.route(Request::Pattern(query, filter)).await.words())
    }

    // -- build lifecycle -----------------------------------------------------

    pub fn status(&self) -> BuildSnapshot {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BuildSnapshot> {
        self.status.subscribe()
    }

    /// Install a previously stored index. Stale or corrupt blobs are
    /// cleared and reported as a miss.
    pub async fn load_cached(&self, store: Arc<dyn IndexStore>) -> bool {
        let loaded = tokio::task::spawn_blocking(move || load_or_discard(store.as_ref())).await;
        match loaded {
            Ok(Some(index)) => {
                info!(words = index.word_count(), "loaded cached index");
                self.upgrade(Arc::new(index));
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "cache load task failed");
                false
            }
        }
    }

    /// Start a background build from `entries`. The finished index replaces
    /// the primary tier and, when `store` is given, is persisted. Must be
    /// called from within a tokio runtime.
    pub fn start_build(
        self: &Arc<Self>,
        entries: Vec<WordEntry>,
        store: Option<Arc<dyn IndexStore>>,
    ) -> Result<JoinHandle<Result<(), BuildError>>, BuildError> {
        let handle = {
            let mut running = self.build_cancel.lock().unwrap_or_else(PoisonError::into_inner);
            if running.is_some() {
                return Err(BuildError::InProgress);
            }
            let handle = IndexBuilder::new(self.settings.builder.clone()).spawn(entries)?;
            *running = Some(handle.canceller());
            handle
        };
        self.status.send_modify(|s| {
            s.status = BuildStatus::Building;
            s.progress = None;
            s.error = None;
        });
        info!("index build started");

        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.drive_build(handle, store).await }))
    }

    /// Abandon the running build, if any. The current primary tier is kept.
    pub fn cancel_build(&self) -> bool {
        match self
            .build_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(flag) => {
                flag.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    async fn drive_build(
        self: Arc<Self>,
        mut handle: BuildHandle,
        store: Option<Arc<dyn IndexStore>>,
    ) -> Result<(), BuildError> {
        let cancel = handle.canceller();
        let result = loop {
            match handle.next_event().await {
                Some(BuildEvent::Progress(p)) => {
                    debug!(processed = p.processed, total = p.total, "index build progress");
                    self.status.send_modify(|s| s.progress = Some(p));
                }
                Some(BuildEvent::Finished(index)) => break Ok(index),
                Some(BuildEvent::Failed(e)) => break Err(e),
                None => break Err(BuildError::Cancelled),
            }
        };
        // Read the flag under the lock so a `cancel_build` that returned true
        // never sees its index installed.
        let cancelled = {
            let mut running = self.build_cancel.lock().unwrap_or_else(PoisonError::into_inner);
            running.take();
            cancel.load(Ordering::Relaxed)
        };
        let result = match result {
            Ok(_) if cancelled => {
                debug!("discarding index finished after cancel");
                Err(BuildError::Cancelled)
            }
            other => other,
        };

        match result {
            Ok(index) => {
                let index = Arc::new(index);
                self.upgrade(Arc::clone(&index));
                if let Some(store) = store {
                    persist(store, index).await;
                }
                Ok(())
            }
            Err(BuildError::Cancelled) => {
                let status = if self.current_primary().is_some() {
                    BuildStatus::Ready
                } else {
                    BuildStatus::Idle
                };
                self.status.send_modify(|s| {
                    s.status = status;
                    s.progress = None;
                });
                info!("index build cancelled");
                Err(BuildError::Cancelled)
            }
            Err(e) => {
                warn!(error = %e, "index build failed");
                self.status.send_modify(|s| {
                    s.status = BuildStatus::Failed;
                    s.error = Some(e.to_string());
                });
                Err(e)
            }
        }
    }

    /// Ensure a primary index: keep the current one, else load `store`, else
    /// build from `source` in the background.
    pub async fn enable_fast_mode(
        self: &Arc<Self>,
        source: &dyn WordSource,
        store: Option<Arc<dyn IndexStore>>,
    ) -> Result<FastMode, BuildError> {
        if self.current_primary().is_some() {
            return Ok(FastMode::AlreadyReady);
        }
        if let Some(store) = &store {
            if self.load_cached(Arc::clone(store)).await {
                return Ok(FastMode::Loaded);
            }
        }
        let entries = match source.load_words().await {
            Ok(entries) => entries,
            Err(e) => {
                let e = BuildError::from(e);
                warn!(error = %e, "word source failed");
                self.status.send_modify(|s| {
                    s.status = BuildStatus::Failed;
                    s.error = Some(e.to_string());
                });
                return Err(e);
            }
        };
        Ok(FastMode::Building(self.start_build(entries, store)?))
    }
}

fn load_or_discard(store: &dyn IndexStore) -> Option<LexiconIndex> {
    match store.load() {
        Ok(index) => index,
        Err(e) if e.is_stale() => {
            warn!(error = %e, "discarding stale cached index");
            if let Err(e) = store.clear() {
                warn!(error = %e, "failed to clear stale cache");
            }
            None
        }
        Err(e) => {
            warn!(error = %e, "failed to read cached index");
            None
        }
    }
}

async fn persist(store: Arc<dyn IndexStore>, index: Arc<LexiconIndex>) {
    match tokio::task::spawn_blocking(move || store.store(&index)).await {
        Ok(Ok(())) => debug!("index persisted"),
        Ok(Err(e)) => warn!(error = %e, "failed to persist index"),
        Err(e) => warn!(error = %e, "persist task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::IndexBackend;
    use crate::store::MemoryIndexStore;

    const WORDS: &[&str] = &["amor", "roma", "mora", "es", "se", "sol", "los", "choza", "jugar", "arma"];

    fn index() -> Arc<LexiconIndex> {
        Arc::new(LexiconIndex::from_words(WORDS))
    }

    #[tokio::test]
    async fn no_tier_yields_empty_results() {
        let lexicon = TieredLexicon::new(Settings::default());
        assert!(!lexicon.search("amor").await);
        assert!(lexicon.find_anagrams("amor").await.is_empty());
        assert!(lexicon.find_anagrams_with_wildcards("amo?", 2).await.unwrap().is_empty());
        assert_eq!(lexicon.last_tier(), None);
    }

    #[tokio::test]
    async fn malformed_requests_are_errors() {
        let lexicon = TieredLexicon::new(Settings::default());
        lexicon.upgrade(index());
        assert!(matches!(
            lexicon.find_anagrams_with_wildcards("a???", 2).await,
            Err(QueryError::TooManyWildcards { found: 3, max: 2 })
        ));
        assert!(matches!(
            lexicon.find_anagrams_with_wildcards("amor", 3).await,
            Err(QueryError::UnsupportedWildcardLimit(3))
        ));
        assert!(lexicon.find_pattern_matches("A+R", false, 8, None).await.is_err());
        assert!(matches!(
            lexicon.find_anagrams_with_wildcards("AMO1", 2).await,
            Err(QueryError::InvalidRack(_))
        ));
        assert!(matches!(
            lexicon.find_sub_anagrams("AM#OR", 2).await,
            Err(QueryError::InvalidRack(_))
        ));
        assert!(matches!(
            lexicon.find_pattern_matches("-OR,AM#", false, 8, None).await,
            Err(QueryError::InvalidRack(_))
        ));
    }

    #[tokio::test]
    async fn primary_answers_first() {
        let lexicon = TieredLexicon::new(Settings::default())
            .with_local(Arc::new(IndexBackend::new(index(), Tier::Local)));
        assert!(lexicon.search("choza").await);
        assert_eq!(lexicon.last_tier(), Some(Tier::Local));

        lexicon.upgrade(index());
        assert_eq!(lexicon.find_anagrams("ramo").await, ["AMOR", "MORA", "ROMA"]);
        assert_eq!(lexicon.last_tier(), Some(Tier::Memory));
        assert_eq!(lexicon.status().status, BuildStatus::Ready);
    }

    #[tokio::test]
    async fn empty_local_tier_is_skipped() {
        let empty = Arc::new(LexiconIndex::new());
        let lexicon = TieredLexicon::new(Settings::default())
            .with_local(Arc::new(IndexBackend::new(empty, Tier::Local)))
            .with_remote(Arc::new(IndexBackend::new(index(), Tier::Remote)));
        // Remote is not consulted before connect().
        assert!(!lexicon.search("amor").await);
        assert!(lexicon.connect().await);
        assert!(lexicon.search("amor").await);
        assert_eq!(lexicon.last_tier(), Some(Tier::Remote));
    }

    #[tokio::test]
    async fn pattern_respects_length_policy() {
        let lexicon = TieredLexicon::new(Settings::default());
        lexicon.upgrade(index());
        assert_eq!(
            lexicon.find_pattern_matches("-AR", false, 8, None).await.unwrap(),
            ["JUGAR"]
        );
        assert!(lexicon.find_pattern_matches("-AR", true, 8, None).await.unwrap().is_empty());
        assert_eq!(
            lexicon.find_pattern_matches("AR-", false, 8, None).await.unwrap(),
            ["ARMA"]
        );
    }

    #[tokio::test]
    async fn build_installs_and_persists() {
        let lexicon = Arc::new(TieredLexicon::new(Settings::default()));
        let store = Arc::new(MemoryIndexStore::new());
        let entries = WORDS.iter().map(|w| WordEntry::from_raw(w)).collect();
        let task = lexicon
            .start_build(entries, Some(store.clone() as Arc<dyn IndexStore>))
            .unwrap();
        task.await.unwrap().unwrap();
        assert!(lexicon.primary().is_some());
        assert!(lexicon.search("sol").await);
        assert!(!store.is_empty());
        let snapshot = lexicon.status();
        assert_eq!(snapshot.status, BuildStatus::Ready);
        assert_eq!(snapshot.progress.map(|p| p.processed), Some(WORDS.len()));
    }

    #[tokio::test]
    async fn failed_build_reports_status() {
        let lexicon = Arc::new(TieredLexicon::new(Settings::default()));
        let task = lexicon.start_build(Vec::new(), None).unwrap();
        assert!(matches!(task.await.unwrap(), Err(BuildError::EmptySource)));
        let snapshot = lexicon.status();
        assert_eq!(snapshot.status, BuildStatus::Failed);
        assert!(snapshot.error.is_some());
        assert!(lexicon.primary().is_none());
    }
}
