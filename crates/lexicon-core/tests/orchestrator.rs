use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lexicon_core::alphabet::Alphagram;
use lexicon_core::store::StaticWordSource;
use lexicon_core::{
    BackendError, BuildStatus, FastMode, FileIndexStore, IndexBackend, IndexStore, LexiconIndex,
    MemoryIndexStore, NormalizedWord, QueryBackend, Settings, Tier, TieredLexicon, WordEntry,
};

const WORDS: &[&str] = &[
    "amor", "roma", "mora", "ramo", "omar", "es", "se", "sol", "los", "oso", "choza", "calle",
    "perro", "jugar", "cantar", "arma", "cocina", "casa", "cosa", "saca", "camión", "toser",
    "notas", "santo", "tonos", "sonata", "retos", "torres",
];

fn index_of(words: &[&str]) -> Arc<LexiconIndex> {
    Arc::new(LexiconIndex::from_words(words))
}

fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.tiers.probe_timeout_ms = 50;
    settings.tiers.query_timeout_ms = 200;
    settings.tiers.remote_probe_timeout_ms = 200;
    settings
}

/// Wraps an index and delays its probe and its lookups.
struct SlowBackend {
    inner: IndexBackend,
    probe_delay: Duration,
    query_delay: Duration,
}

impl SlowBackend {
    fn new(index: Arc<LexiconIndex>, tier: Tier, probe_delay: Duration, query_delay: Duration) -> Self {
        Self {
            inner: IndexBackend::new(index, tier),
            probe_delay,
            query_delay,
        }
    }
}

#[async_trait]
impl QueryBackend for SlowBackend {
    fn tier(&self) -> Tier {
        self.inner.tier()
    }

    async fn contains(&self, word: &NormalizedWord) -> Result<bool, BackendError> {
        tokio::time::sleep(self.query_delay).await;
        self.inner.contains(word).await
    }

    async fn words_by_length(&self, len: usize) -> Result<Vec<WordEntry>, BackendError> {
        tokio::time::sleep(self.query_delay).await;
        self.inner.words_by_length(len).await
    }

    async fn words_by_alphagram(&self, alphagram: &Alphagram) -> Result<Vec<String>, BackendError> {
        tokio::time::sleep(self.query_delay).await;
        self.inner.words_by_alphagram(alphagram).await
    }

    async fn probe(&self, alphagram: &Alphagram) -> Result<bool, BackendError> {
        tokio::time::sleep(self.probe_delay).await;
        self.inner.probe(alphagram).await
    }
}

/// A backend whose data can be replaced and whose lookups can be made to fail.
struct ChangingBackend {
    index: RwLock<Arc<LexiconIndex>>,
    tier: Tier,
    failing: AtomicBool,
}

impl ChangingBackend {
    fn new(words: &[&str], tier: Tier) -> Self {
        Self {
            index: RwLock::new(index_of(words)),
            tier,
            failing: AtomicBool::new(false),
        }
    }

    fn replace(&self, words: &[&str]) {
        *self.index.write().unwrap() = index_of(words);
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn current(&self) -> Result<IndexBackend, BackendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("connection reset".into()));
        }
        Ok(IndexBackend::new(self.index.read().unwrap().clone(), self.tier))
    }
}

#[async_trait]
impl QueryBackend for ChangingBackend {
    fn tier(&self) -> Tier {
        self.tier
    }

    async fn contains(&self, word: &NormalizedWord) -> Result<bool, BackendError> {
        self.current()?.contains(word).await
    }

    async fn words_by_length(&self, len: usize) -> Result<Vec<WordEntry>, BackendError> {
        self.current()?.words_by_length(len).await
    }

    async fn words_by_alphagram(&self, alphagram: &Alphagram) -> Result<Vec<String>, BackendError> {
        self.current()?.words_by_alphagram(alphagram).await
    }
}

#[tokio::test]
async fn slow_local_tier_falls_through_to_remote() {
    let local = SlowBackend::new(
        index_of(WORDS),
        Tier::Local,
        Duration::from_secs(30),
        Duration::ZERO,
    );
    let remote = IndexBackend::new(index_of(WORDS), Tier::Remote);
    let lexicon = TieredLexicon::new(fast_settings())
        .with_local(Arc::new(local))
        .with_remote(Arc::new(remote));
    assert!(lexicon.connect().await);

    let start = Instant::now();
    assert_eq!(lexicon.find_anagrams("mora").await, ["AMOR", "MORA", "OMAR", "RAMO", "ROMA"]);
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(lexicon.last_tier(), Some(Tier::Remote));
}

#[tokio::test]
async fn hanging_tiers_degrade_to_empty() {
    let local = SlowBackend::new(
        index_of(WORDS),
        Tier::Local,
        Duration::ZERO,
        Duration::from_secs(30),
    );
    let lexicon = TieredLexicon::new(fast_settings()).with_local(Arc::new(local));

    let start = Instant::now();
    assert!(!lexicon.search("amor").await);
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(lexicon.last_tier(), None);
}

#[tokio::test]
async fn unreachable_remote_is_not_used() {
    let remote = SlowBackend::new(
        index_of(WORDS),
        Tier::Remote,
        Duration::from_secs(30),
        Duration::ZERO,
    );
    let lexicon = TieredLexicon::new(fast_settings()).with_remote(Arc::new(remote));
    assert!(!lexicon.connect().await);
    assert!(lexicon.find_anagrams("amor").await.is_empty());
    assert_eq!(lexicon.last_tier(), None);
}

#[tokio::test]
async fn memory_and_scan_tiers_agree() {
    let index = index_of(WORDS);
    let memory = TieredLexicon::new(Settings::default());
    memory.upgrade(Arc::clone(&index));
    let local = TieredLexicon::new(Settings::default())
        .with_local(Arc::new(IndexBackend::new(index, Tier::Local)));

    for word in ["amor", "choza", "xyz", "camion"] {
        assert_eq!(memory.search(word).await, local.search(word).await, "{word}");
        assert_eq!(memory.find_anagrams(word).await, local.find_anagrams(word).await, "{word}");
    }
    for rack in ["amor", "amo?", "sol", "sol?", "ntoas", "ntoa??", "achoz"] {
        assert_eq!(
            memory.find_anagrams_with_wildcards(rack, 2).await.unwrap(),
            local.find_anagrams_with_wildcards(rack, 2).await.unwrap(),
            "{rack}"
        );
        assert_eq!(
            memory.find_sub_anagrams(rack, 2).await.unwrap(),
            local.find_sub_anagrams(rack, 2).await.unwrap(),
            "{rack}"
        );
    }
    for (pattern, longer) in [
        ("-AR", false),
        ("AR-", false),
        ("-CI-", false),
        ("-CI-", true),
        ("C..A", false),
        ("-O-A-", false),
        ("S*S,AOTN?", false),
        ("-R-,EOSTR", false),
        ("T.R..:6", false),
    ] {
        assert_eq!(
            memory.find_pattern_matches(pattern, longer, 5, None).await.unwrap(),
            local.find_pattern_matches(pattern, longer, 5, None).await.unwrap(),
            "{pattern}"
        );
    }
    assert_eq!(memory.last_tier(), Some(Tier::Memory));
    assert_eq!(local.last_tier(), Some(Tier::Local));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hot_upgrade_is_atomic() {
    let old = ["amor", "roma", "es"];
    let new = ["amor", "mora", "ramo", "omar", "es", "se"];
    let lexicon = Arc::new(
        TieredLexicon::new(Settings::default())
            .with_local(Arc::new(IndexBackend::new(index_of(&old), Tier::Local))),
    );
    let before = vec!["AMOR".to_string(), "ROMA".to_string()];
    let after = vec![
        "AMOR".to_string(),
        "MORA".to_string(),
        "OMAR".to_string(),
        "RAMO".to_string(),
    ];

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let lexicon = Arc::clone(&lexicon);
        let (before, after) = (before.clone(), after.clone());
        tasks.push(tokio::spawn(async move {
            for _ in 0..200 {
                let words = lexicon.find_anagrams("roma").await;
                assert!(words == before || words == after, "mixed result {words:?}");
                tokio::task::yield_now().await;
            }
        }));
    }

    tokio::time::sleep(Duration::from_millis(5)).await;
    lexicon.upgrade(index_of(&new));
    for _ in 0..50 {
        assert_eq!(lexicon.find_anagrams("roma").await, after);
        assert_eq!(lexicon.last_tier(), Some(Tier::Memory));
    }
    for task in tasks {
        task.await.unwrap();
    }
}

#[tokio::test]
async fn build_is_persisted_and_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn IndexStore> = Arc::new(FileIndexStore::new(dir.path().join("lexicon.lxix")));
    let entries: Vec<WordEntry> = WORDS.iter().map(|w| WordEntry::from_raw(w)).collect();

    let first = Arc::new(TieredLexicon::new(Settings::default()));
    let mut status = first.subscribe();
    let task = first.start_build(entries, Some(Arc::clone(&store))).unwrap();
    task.await.unwrap().unwrap();
    status
        .wait_for(|s| s.status == BuildStatus::Ready)
        .await
        .unwrap();
    assert!(dir.path().join("lexicon.lxix").exists());

    let second = TieredLexicon::new(Settings::default());
    assert!(second.load_cached(Arc::clone(&store)).await);
    assert!(second.search("camión").await);
    assert_eq!(
        second.primary().unwrap().word_count(),
        first.primary().unwrap().word_count()
    );
}

#[tokio::test]
async fn stale_cache_is_discarded() {
    let mut bytes = LexiconIndex::from_words(WORDS).to_bytes().unwrap();
    bytes[4] = lexicon_core::index::INDEX_FORMAT_VERSION + 1;
    let store = Arc::new(MemoryIndexStore::with_bytes(bytes));

    let lexicon = TieredLexicon::new(Settings::default());
    assert!(!lexicon.load_cached(store.clone()).await);
    assert!(store.is_empty());
    assert!(lexicon.primary().is_none());
    assert_eq!(lexicon.status().status, BuildStatus::Idle);
}

#[tokio::test]
async fn fast_mode_builds_then_loads() {
    let store: Arc<dyn IndexStore> = Arc::new(MemoryIndexStore::new());
    let source = StaticWordSource::new(WORDS);

    let first = Arc::new(TieredLexicon::new(Settings::default()));
    match first.enable_fast_mode(&source, Some(Arc::clone(&store))).await.unwrap() {
        FastMode::Building(task) => task.await.unwrap().unwrap(),
        other => panic!("expected a build, got {other:?}"),
    }
    assert!(first.search("choza").await);
    assert!(matches!(
        first.enable_fast_mode(&source, Some(Arc::clone(&store))).await.unwrap(),
        FastMode::AlreadyReady
    ));

    let second = Arc::new(TieredLexicon::new(Settings::default()));
    assert!(matches!(
        second.enable_fast_mode(&source, Some(store)).await.unwrap(),
        FastMode::Loaded
    ));
    assert_eq!(second.find_anagrams("roma").await.len(), 5);
}

#[tokio::test]
async fn second_build_is_rejected_while_running() {
    let entries: Vec<WordEntry> = (0..200_000)
        .map(|i| WordEntry::from_raw(&format!("S{}", "A".repeat(i % 50 + 1))))
        .collect();
    let mut settings = Settings::default();
    settings.builder.batch_size = 10;
    settings.builder.progress_interval = 10;
    settings.builder.channel_capacity = 1;
    let lexicon = Arc::new(TieredLexicon::new(settings));

    let task = lexicon.start_build(entries, None).unwrap();
    assert!(matches!(
        lexicon.start_build(vec![WordEntry::from_raw("sol")], None),
        Err(lexicon_core::BuildError::InProgress)
    ));
    assert!(lexicon.cancel_build());
    assert!(matches!(task.await.unwrap(), Err(lexicon_core::BuildError::Cancelled)));
    assert_eq!(lexicon.status().status, BuildStatus::Idle);
    assert!(lexicon.primary().is_none());
}

#[tokio::test]
async fn local_answers_follow_backend_data() {
    let local = Arc::new(ChangingBackend::new(&["es", "amor"], Tier::Local));
    let lexicon = TieredLexicon::new(Settings::default()).with_local(local.clone());
    assert_eq!(lexicon.find_anagrams("roma").await, ["AMOR"]);

    local.replace(&["es", "amor", "roma", "mora"]);
    assert_eq!(lexicon.find_anagrams("roma").await, ["AMOR", "MORA", "ROMA"]);
    assert_eq!(lexicon.last_tier(), Some(Tier::Local));
}

#[tokio::test]
async fn failed_remote_is_disabled_until_reconnected() {
    let remote = Arc::new(ChangingBackend::new(WORDS, Tier::Remote));
    let lexicon = TieredLexicon::new(fast_settings()).with_remote(remote.clone());
    assert!(lexicon.connect().await);
    assert!(lexicon.search("sol").await);

    remote.set_failing(true);
    assert!(!lexicon.search("sol").await);
    assert_eq!(lexicon.last_tier(), None);

    // Recovered, but not consulted before the next connect.
    remote.set_failing(false);
    assert!(!lexicon.search("sol").await);
    assert_eq!(lexicon.last_tier(), None);

    assert!(lexicon.connect().await);
    assert!(lexicon.search("sol").await);
    assert_eq!(lexicon.last_tier(), Some(Tier::Remote));
}

#[tokio::test]
async fn cancel_during_single_batch_installs_nothing() {
    let entries: Vec<WordEntry> = (0..300_000)
        .map(|i| WordEntry::from_raw(&format!("S{}", "A".repeat(i % 50 + 1))))
        .collect();
    let mut settings = Settings::default();
    settings.builder.batch_size = 1_000_000;
    settings.builder.progress_interval = 1_000;
    settings.builder.channel_capacity = 1;
    let lexicon = Arc::new(TieredLexicon::new(settings));
    let mut status = lexicon.subscribe();

    let task = lexicon.start_build(entries, None).unwrap();
    status.wait_for(|s| s.progress.is_some()).await.unwrap();
    assert!(lexicon.cancel_build());

    assert!(matches!(task.await.unwrap(), Err(lexicon_core::BuildError::Cancelled)));
    assert!(lexicon.primary().is_none());
    assert_eq!(lexicon.status().status, BuildStatus::Idle);
    assert!(!lexicon.search("sa").await);
}
