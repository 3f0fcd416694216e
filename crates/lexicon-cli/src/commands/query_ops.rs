use std::sync::Arc;

use lexicon_core::settings::Settings;
use lexicon_core::{BuildError, FastMode, FileIndexStore, FileWordSource, IndexStore, TieredLexicon};

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("pass --index <file> and/or --words <file>")]
    NoSource,
    #[error("no usable index at {0}")]
    MissingIndex(String),
    #[error("index build failed: {0}")]
    Build(#[from] BuildError),
    #[error("index build task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Where the queried lexicon comes from. With both set, `index` caches the
/// index built from `words`.
#[derive(Debug, Clone, Default)]
pub struct LexiconSource {
    pub index: Option<String>,
    pub words: Option<String>,
}

pub async fn open_lexicon(
    settings: Settings,
    source: &LexiconSource,
) -> Result<Arc<TieredLexicon>, OpenError> {
    let lexicon = Arc::new(TieredLexicon::new(settings));
    let store = source
        .index
        .as_ref()
        .map(|path| Arc::new(FileIndexStore::new(path)) as Arc<dyn IndexStore>);

    match (&source.words, store) {
        (Some(words), store) => {
            let words = FileWordSource::new(words);
            if let FastMode::Building(task) = lexicon.enable_fast_mode(&words, store).await? {
                task.await??;
            }
        }
        (None, Some(store)) => {
            if !lexicon.load_cached(store).await {
                return Err(OpenError::MissingIndex(
                    source.index.clone().unwrap_or_default(),
                ));
            }
        }
        (None, None) => return Err(OpenError::NoSource),
    }
    Ok(lexicon)
}

async fn open(settings: Settings, source: &LexiconSource) -> Arc<TieredLexicon> {
    die!(open_lexicon(settings, source).await, "Error: {}")
}

fn print_words(words: &[String]) {
    for w in words {
        println!("{w}");
    }
    eprintln!("({} words)", words.len());
}

pub async fn search(settings: Settings, source: &LexiconSource, word: &str) {
    let lexicon = open(settings, source).await;
    let found = lexicon.search(word).await;
    println!("{word}: {}", if found { "valid" } else { "not found" });
    if !found {
        std::process::exit(2);
    }
}

pub async fn anagram(settings: Settings, source: &LexiconSource, letters: &str) {
    let lexicon = open(settings, source).await;
    print_words(&lexicon.find_anagrams(letters).await);
}

pub async fn wildcard(settings: Settings, source: &LexiconSource, rack: &str, max_wildcards: Option<u8>) {
    let max = max_wildcards.unwrap_or(settings.query.max_wildcards);
    let lexicon = open(settings, source).await;
    let matches = die!(
        lexicon.find_anagrams_with_wildcards(rack, max).await,
        "Error: {}"
    );
    for (label, words) in [
        ("exact", &matches.exact),
        ("wildcard", &matches.wildcard),
        ("additional", &matches.additional),
    ] {
        println!("[{label}] {}", words.len());
        for w in words {
            println!("  {w}");
        }
    }
}

pub async fn sub(settings: Settings, source: &LexiconSource, rack: &str, min_length: Option<usize>) {
    let min = min_length.unwrap_or(settings.query.min_sub_anagram_length);
    let lexicon = open(settings, source).await;
    let words = die!(lexicon.find_sub_anagrams(rack, min).await, "Error: {}");
    print_words(&words);
}

pub async fn pattern(
    settings: Settings,
    source: &LexiconSource,
    query: &str,
    longer: bool,
    length: Option<usize>,
) {
    let default_max = settings.query.default_max_length;
    let lexicon = open(settings, source).await;
    let words = die!(
        lexicon
            .find_pattern_matches(query, longer, default_max, length)
            .await,
        "Error: {}"
    );
    print_words(&words);
}
